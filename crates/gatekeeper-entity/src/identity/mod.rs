//! Identity domain entities.

pub mod model;
pub mod role;
pub mod status;

pub use model::{Identity, IdentityProfile, NewIdentity, normalize_email};
pub use role::UserRole;
pub use status::UserStatus;
