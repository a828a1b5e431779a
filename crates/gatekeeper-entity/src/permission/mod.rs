//! Permission catalog, assignments, and derived effective sets.

pub mod assignment;
pub mod effective;
pub mod grant;

pub use assignment::UserPermissionAssignment;
pub use effective::{EffectivePermission, EffectivePermissionSet, PermissionSource};
pub use grant::{PermissionGrant, PermissionTuple};
