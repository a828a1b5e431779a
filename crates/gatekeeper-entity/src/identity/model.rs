//! Identity entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::role::UserRole;
use super::status::UserStatus;

/// A registered identity belonging to exactly one tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Identity {
    /// Unique identity identifier.
    pub id: Uuid,
    /// Lowercase-normalized, unique email.
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Human-readable display name.
    pub name: String,
    /// Role (closed set).
    pub role: UserRole,
    /// Account status.
    pub status: UserStatus,
    /// Reason recorded when the account was suspended.
    pub status_reason: Option<String>,
    /// Owning tenant (company).
    pub tenant_id: Uuid,
    /// SHA-256 hex digest of the one currently valid refresh token.
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    /// Bumped by every change to the identity's effective permissions.
    pub permissions_version: i64,
    /// Last successful login time.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Last password change.
    pub password_changed_at: Option<DateTime<Utc>>,
    /// When the identity was created.
    pub created_at: DateTime<Utc>,
    /// When the identity was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Check if this identity bypasses explicit permission assignments.
    pub fn is_superadmin(&self) -> bool {
        self.role.is_superadmin()
    }

    /// Check whether the given refresh-token digest is the stored one.
    pub fn holds_refresh_token(&self, digest: &str) -> bool {
        self.refresh_token_hash.as_deref() == Some(digest)
    }

    /// Secret-free view of this identity.
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile::from(self)
    }
}

/// Data required to create a new identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    /// Normalized email.
    pub email: String,
    /// Pre-hashed password.
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Assigned role.
    pub role: UserRole,
    /// Owning tenant.
    pub tenant_id: Uuid,
}

/// Identity as returned to callers: no password hash, no refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    /// Identity ID.
    pub id: Uuid,
    /// Email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role.
    pub role: UserRole,
    /// Status.
    pub status: UserStatus,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for IdentityProfile {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            status: identity.status,
            tenant_id: identity.tenant_id,
            last_login_at: identity.last_login_at,
            created_at: identity.created_at,
        }
    }
}

/// Trim and lowercase an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
