//! Effective permission resolution: role, then cache, then store.

use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use gatekeeper_core::config::AuthConfig;
use gatekeeper_core::deadline::bounded_read_with_retry;
use gatekeeper_core::error::AppError;
use gatekeeper_core::result::AppResult;
use gatekeeper_database::{CredentialStores, IdentityWithTenant};
use gatekeeper_entity::{EffectivePermissionSet, PermissionSource, PermissionTuple};

use super::cache::PermissionCache;
use crate::status::ensure_usable;

/// Computes what an identity may do.
///
/// The identity and its tenant flag are always read fresh from the store,
/// so status and tenant changes take effect on the next check. Superadmins
/// receive the whole catalog without consulting the cache. Everyone else
/// is served from the cache when it holds a set at the identity's current
/// `permissions_version`, and from the store otherwise.
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    stores: CredentialStores,
    cache: PermissionCache,
    store_timeout: Duration,
}

impl PermissionResolver {
    /// Creates a resolver over the given stores and cache.
    pub fn new(stores: CredentialStores, cache: PermissionCache, config: &AuthConfig) -> Self {
        Self {
            stores,
            cache,
            store_timeout: config.store_timeout(),
        }
    }

    async fn load_account(&self, user_id: Uuid) -> AppResult<IdentityWithTenant> {
        let identities = self.stores.identities.clone();
        bounded_read_with_retry(self.store_timeout, "identity.find_account", || {
            let identities = identities.clone();
            async move { identities.find_account(user_id).await }
        })
        .await?
        .ok_or_else(|| AppError::not_found(format!("Identity {user_id} not found")))
    }

    /// Resolve the effective permission set for `user_id`.
    pub async fn resolve(&self, user_id: Uuid) -> AppResult<EffectivePermissionSet> {
        let account = self.load_account(user_id).await?;
        ensure_usable(&account)?;
        self.resolve_loaded(&account).await
    }

    async fn resolve_loaded(
        &self,
        account: &IdentityWithTenant,
    ) -> AppResult<EffectivePermissionSet> {
        let identity = &account.identity;
        let user_id = identity.id;
        let version = identity.permissions_version;

        if identity.is_superadmin() {
            let permissions = self.stores.permissions.clone();
            let catalog = bounded_read_with_retry(self.store_timeout, "permission.list_grants", || {
                let permissions = permissions.clone();
                async move { permissions.list_grants().await }
            })
            .await?;
            return Ok(EffectivePermissionSet::from_grants(
                user_id,
                version,
                &catalog,
                PermissionSource::RoleDerived,
            ));
        }

        if let Some(set) = self.cache.get(user_id, version).await {
            return Ok(set);
        }

        let permissions = self.stores.permissions.clone();
        let grants =
            bounded_read_with_retry(self.store_timeout, "permission.granted_permissions", || {
                let permissions = permissions.clone();
                async move { permissions.granted_permissions(user_id).await }
            })
            .await?;

        let set = EffectivePermissionSet::from_grants(
            user_id,
            version,
            &grants,
            PermissionSource::ExplicitGrant,
        );
        debug!(user_id = %user_id, version, count = set.len(), "Resolved permissions from store");
        self.cache.put(&set).await;
        Ok(set)
    }

    /// Superadmins pass without resolving; everyone else is tested
    /// against their resolved set.
    async fn decide(
        &self,
        user_id: Uuid,
        test: impl FnOnce(&EffectivePermissionSet) -> bool,
    ) -> AppResult<bool> {
        let account = self.load_account(user_id).await?;
        ensure_usable(&account)?;
        if account.identity.is_superadmin() {
            return Ok(true);
        }
        let set = self.resolve_loaded(&account).await?;
        Ok(test(&set))
    }

    /// Whether `user_id` holds `tuple`.
    pub async fn check(&self, user_id: Uuid, tuple: &PermissionTuple) -> AppResult<bool> {
        self.decide(user_id, |set| set.contains(tuple)).await
    }

    /// Whether `user_id` holds at least one of `tuples`.
    pub async fn check_any(&self, user_id: Uuid, tuples: &[PermissionTuple]) -> AppResult<bool> {
        self.decide(user_id, |set| set.contains_any(tuples)).await
    }

    /// Whether `user_id` holds every one of `tuples`.
    pub async fn check_all(&self, user_id: Uuid, tuples: &[PermissionTuple]) -> AppResult<bool> {
        self.decide(user_id, |set| set.contains_all(tuples)).await
    }

    /// Drop the cached set for `user_id`.
    pub async fn invalidate(&self, user_id: Uuid) {
        self.cache.invalidate(user_id).await;
    }
}
