//! Tenant entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Isolation boundary every identity belongs to.
///
/// An inactive tenant blocks login, refresh, and permission checks for
/// all of its members. The flag is always read fresh from the store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    /// Unique tenant identifier.
    pub id: Uuid,
    /// Company name.
    pub name: String,
    /// Whether members may use the system.
    pub is_active: bool,
    /// When the tenant was created.
    pub created_at: DateTime<Utc>,
}
