//! # gatekeeper-auth
//!
//! Authentication and authorization core for Gatekeeper.
//!
//! ## Modules
//!
//! - `password`: Argon2id password hashing and policy enforcement
//! - `jwt`: Access and refresh token issuing and verification
//! - `session`: Register, login, refresh rotation, logout, password change
//! - `permission`: Effective permission resolution, caching, and assignment admin
//! - `account`: Administrative identity, status, role, and tenant operations
//! - `guard`: Bearer authentication and permission gates for protected requests
//! - `status`: Account and tenant status gates

pub mod account;
pub mod guard;
pub mod jwt;
pub mod password;
pub mod permission;
pub mod session;
pub mod status;

pub use account::{AccountAdmin, CreateIdentityRequest};
pub use guard::{AuthGate, IdentityContext, PermissionGate, extract_bearer};
pub use jwt::{AccessClaims, JwtDecoder, JwtEncoder, RefreshClaims, TokenPair};
pub use password::{PasswordHasher, PasswordValidator};
pub use permission::{PermissionAdmin, PermissionCache, PermissionResolver};
pub use session::{AuthOutcome, Registration, SessionManager};
