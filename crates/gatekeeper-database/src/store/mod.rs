//! Credential store seams.
//!
//! The session manager, permission resolver, and admin services receive
//! these as `Arc<dyn …>` at construction. Implementations must make every
//! mutation below atomic with respect to concurrent callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use gatekeeper_core::result::AppResult;
use gatekeeper_entity::{
    Identity, NewIdentity, PermissionGrant, PermissionTuple, Tenant, UserPermissionAssignment,
    UserRole, UserStatus,
};

/// An identity joined with its tenant's active flag, read in one lookup.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IdentityWithTenant {
    /// The identity row.
    #[sqlx(flatten)]
    pub identity: Identity,
    /// Whether the owning tenant is active right now.
    pub tenant_active: bool,
}

/// Identity persistence.
#[async_trait]
pub trait IdentityStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find an identity by normalized email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>>;

    /// Find an identity by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Identity>>;

    /// Find an identity by normalized email, joined with its tenant flag.
    async fn find_account_by_email(&self, email: &str) -> AppResult<Option<IdentityWithTenant>>;

    /// Find an identity by ID, joined with its tenant flag.
    async fn find_account(&self, id: Uuid) -> AppResult<Option<IdentityWithTenant>>;

    /// Persist a new ACTIVE identity. `Conflict` on duplicate email,
    /// `NotFound` on unknown tenant.
    async fn create(&self, new: NewIdentity) -> AppResult<Identity>;

    /// Store the refresh-token digest and last-login time after a login.
    ///
    /// Only applies while the identity is still ACTIVE and its password hash
    /// still equals `expected_password_hash`. Returns whether it applied.
    async fn record_login(
        &self,
        id: Uuid,
        expected_password_hash: &str,
        refresh_hash: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Atomically replace the stored refresh-token digest if, and only if,
    /// it currently equals `expected`. Returns whether the swap happened.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> AppResult<bool>;

    /// Unconditionally clear the stored refresh token. Idempotent.
    async fn clear_refresh_token(&self, id: Uuid) -> AppResult<()>;

    /// Replace the password hash, stamp the change, and clear the refresh token.
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Change status. Any non-ACTIVE status clears the refresh token in
    /// the same operation.
    async fn update_status(
        &self,
        id: Uuid,
        status: UserStatus,
        reason: Option<&str>,
    ) -> AppResult<()>;

    /// Change role and bump `permissions_version`. Promotion to
    /// superadmin drops every explicit assignment in the same operation.
    async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<()>;

    /// Delete an identity and its assignments. Returns `false` if absent.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Whether at least one superadmin exists.
    async fn superadmin_exists(&self) -> AppResult<bool>;
}

/// Tenant persistence.
#[async_trait]
pub trait TenantStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a tenant by ID.
    async fn find_tenant(&self, id: Uuid) -> AppResult<Option<Tenant>>;

    /// Find a tenant by exact name.
    async fn find_tenant_by_name(&self, name: &str) -> AppResult<Option<Tenant>>;

    /// Create an active tenant.
    async fn create_tenant(&self, name: &str) -> AppResult<Tenant>;

    /// Flip the tenant's active flag. `NotFound` if absent.
    async fn set_tenant_active(&self, id: Uuid, active: bool) -> AppResult<()>;
}

/// Permission catalog and assignment persistence.
#[async_trait]
pub trait PermissionStore: Send + Sync + std::fmt::Debug + 'static {
    /// The full catalog, ordered by tuple.
    async fn list_grants(&self) -> AppResult<Vec<PermissionGrant>>;

    /// Find a catalog entry by its triple.
    async fn find_grant(&self, tuple: &PermissionTuple) -> AppResult<Option<PermissionGrant>>;

    /// Add a catalog entry. `Conflict` if the triple exists.
    async fn create_grant(
        &self,
        tuple: &PermissionTuple,
        description: &str,
    ) -> AppResult<PermissionGrant>;

    /// Change a grant's description, the only mutable field.
    async fn update_grant_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> AppResult<PermissionGrant>;

    /// Remove an unreferenced grant. `Conflict` while any assignment row
    /// references it; `false` if it does not exist.
    async fn delete_grant(&self, id: Uuid) -> AppResult<bool>;

    /// Grants currently in force for an identity (assignment `granted = true`).
    async fn granted_permissions(&self, user_id: Uuid) -> AppResult<Vec<PermissionGrant>>;

    /// Every assignment row for an identity, revoked ones included.
    async fn list_assignments(&self, user_id: Uuid) -> AppResult<Vec<UserPermissionAssignment>>;

    /// Grant `permission_id` to `user_id` and bump the identity's
    /// `permissions_version`, atomically.
    ///
    /// `NotFound` for an unknown identity or grant, `Forbidden` for a
    /// superadmin target, `Conflict` if already granted. A revoked row is
    /// re-granted.
    async fn grant_assignment(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        granted_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<UserPermissionAssignment>;

    /// Revoke an active assignment and bump `permissions_version`,
    /// atomically. Returns `false` when nothing was in force.
    async fn revoke_assignment(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        revoked_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;
}
