//! # gatekeeper-entity
//!
//! Domain models for Gatekeeper. Every struct in this crate represents a
//! credential-store row or a derived value object. Row types additionally
//! derive `sqlx::FromRow`; role and status are closed enumerations mapped
//! to PostgreSQL enum types.

pub mod identity;
pub mod permission;
pub mod tenant;

pub use identity::{
    Identity, IdentityProfile, NewIdentity, UserRole, UserStatus, normalize_email,
};
pub use permission::{
    EffectivePermission, EffectivePermissionSet, PermissionGrant, PermissionSource,
    PermissionTuple, UserPermissionAssignment,
};
pub use tenant::Tenant;
