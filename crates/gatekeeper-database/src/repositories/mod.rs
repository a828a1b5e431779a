//! PostgreSQL repository implementations of the store traits.

pub mod permission;
pub mod tenant;
pub mod user;

pub use permission::PermissionRepository;
pub use tenant::TenantRepository;
pub use user::UserRepository;

use gatekeeper_core::error::{AppError, ErrorKind};

/// Map a sqlx error to `Conflict` on unique violation, `Database` otherwise.
pub(crate) fn map_write_err(err: sqlx::Error, conflict: &str, context: &'static str) -> AppError {
    let unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    if unique {
        AppError::conflict(conflict)
    } else {
        AppError::with_source(ErrorKind::Database, context, err)
    }
}

pub(crate) fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}
