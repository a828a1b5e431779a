//! Effective-permission resolution, caching, and assignment management.

pub mod admin;
pub mod cache;
pub mod resolver;

pub use admin::PermissionAdmin;
pub use cache::PermissionCache;
pub use resolver::PermissionResolver;
