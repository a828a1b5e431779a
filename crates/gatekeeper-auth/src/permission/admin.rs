//! Grant catalog management and per-identity assignments.

use std::time::Duration;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use gatekeeper_core::config::AuthConfig;
use gatekeeper_core::deadline::bounded;
use gatekeeper_core::error::AppError;
use gatekeeper_core::result::AppResult;
use gatekeeper_database::CredentialStores;
use gatekeeper_entity::{PermissionGrant, PermissionTuple, UserPermissionAssignment};

use super::resolver::PermissionResolver;

/// Mutates the catalog and assignments, invalidating cached sets before
/// returning.
#[derive(Debug, Clone)]
pub struct PermissionAdmin {
    stores: CredentialStores,
    resolver: PermissionResolver,
    store_timeout: Duration,
}

impl PermissionAdmin {
    /// Creates the admin service.
    pub fn new(stores: CredentialStores, resolver: PermissionResolver, config: &AuthConfig) -> Self {
        Self {
            stores,
            resolver,
            store_timeout: config.store_timeout(),
        }
    }

    async fn grant_for(&self, tuple: &PermissionTuple) -> AppResult<PermissionGrant> {
        bounded(
            self.store_timeout,
            "permission.find_grant",
            self.stores.permissions.find_grant(tuple),
        )
        .await?
        .ok_or_else(|| AppError::not_found(format!("Permission {tuple} not found")))
    }

    /// The whole catalog, ordered by tuple.
    pub async fn list_grants(&self) -> AppResult<Vec<PermissionGrant>> {
        bounded(
            self.store_timeout,
            "permission.list_grants",
            self.stores.permissions.list_grants(),
        )
        .await
    }

    /// Add a catalog entry.
    pub async fn create_grant(
        &self,
        tuple: &PermissionTuple,
        description: &str,
    ) -> AppResult<PermissionGrant> {
        let grant = bounded(
            self.store_timeout,
            "permission.create_grant",
            self.stores.permissions.create_grant(tuple, description.trim()),
        )
        .await?;
        info!(permission = %tuple, "Permission created");
        Ok(grant)
    }

    /// Change a grant's description.
    pub async fn update_grant_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> AppResult<PermissionGrant> {
        bounded(
            self.store_timeout,
            "permission.update_grant",
            self.stores
                .permissions
                .update_grant_description(id, description.trim()),
        )
        .await
    }

    /// Remove a grant no assignment references.
    pub async fn delete_grant(&self, id: Uuid) -> AppResult<()> {
        let deleted = bounded(
            self.store_timeout,
            "permission.delete_grant",
            self.stores.permissions.delete_grant(id),
        )
        .await?;
        if !deleted {
            return Err(AppError::not_found(format!("Permission {id} not found")));
        }
        info!(permission_id = %id, "Permission deleted");
        Ok(())
    }

    /// Grant `tuple` to `user_id` on behalf of `actor`.
    pub async fn assign(
        &self,
        actor: Uuid,
        user_id: Uuid,
        tuple: &PermissionTuple,
    ) -> AppResult<UserPermissionAssignment> {
        let grant = self.grant_for(tuple).await?;
        let row = bounded(
            self.store_timeout,
            "permission.grant_assignment",
            self.stores
                .permissions
                .grant_assignment(user_id, grant.id, actor, Utc::now()),
        )
        .await?;

        self.resolver.invalidate(user_id).await;
        info!(user_id = %user_id, actor = %actor, permission = %tuple, "Permission assigned");
        Ok(row)
    }

    /// Revoke `tuple` from `user_id`. `NotFound` when nothing was in force.
    pub async fn revoke(&self, actor: Uuid, user_id: Uuid, tuple: &PermissionTuple) -> AppResult<()> {
        let grant = self.grant_for(tuple).await?;
        let revoked = bounded(
            self.store_timeout,
            "permission.revoke_assignment",
            self.stores
                .permissions
                .revoke_assignment(user_id, grant.id, actor, Utc::now()),
        )
        .await?;

        if !revoked {
            return Err(AppError::not_found(format!(
                "No active assignment of {tuple} for identity {user_id}"
            )));
        }

        self.resolver.invalidate(user_id).await;
        info!(user_id = %user_id, actor = %actor, permission = %tuple, "Permission revoked");
        Ok(())
    }

    /// Every assignment row for `user_id`, revoked ones included.
    pub async fn list_assignments(&self, user_id: Uuid) -> AppResult<Vec<UserPermissionAssignment>> {
        bounded(
            self.store_timeout,
            "permission.list_assignments",
            self.stores.permissions.list_assignments(user_id),
        )
        .await
    }
}
