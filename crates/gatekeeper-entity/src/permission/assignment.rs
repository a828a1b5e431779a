//! Identity-to-grant assignment rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Relation between an identity and a catalog grant.
///
/// Revocation keeps the row with `granted = false`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPermissionAssignment {
    /// Identity holding the assignment.
    pub user_id: Uuid,
    /// Catalog grant.
    pub permission_id: Uuid,
    /// Whether the grant is currently in force.
    pub granted: bool,
    /// When the assignment was last granted or revoked.
    pub granted_at: DateTime<Utc>,
    /// Identity that granted or revoked it.
    pub granted_by: Uuid,
}
