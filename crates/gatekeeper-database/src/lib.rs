//! # gatekeeper-database
//!
//! The credential store: the traits the authentication core consumes,
//! an in-memory implementation for tests and single-node use, and
//! PostgreSQL repositories backed by `sqlx`.

pub mod connection;
pub mod handles;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use handles::CredentialStores;
pub use memory::MemoryCredentialStore;
pub use store::{IdentityStore, IdentityWithTenant, PermissionStore, TenantStore};
