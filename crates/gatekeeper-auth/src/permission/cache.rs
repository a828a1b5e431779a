//! Version-tagged cache of effective permission sets.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use gatekeeper_cache::{CacheManager, keys};
use gatekeeper_core::config::AuthConfig;
use gatekeeper_core::deadline::bounded;
use gatekeeper_core::traits::CacheProvider;
use gatekeeper_entity::EffectivePermissionSet;

/// Read-through cache for [`EffectivePermissionSet`]s, keyed by identity.
///
/// Never authoritative. Every failure (timeout, backend error, corrupt
/// entry) is logged and reported as a miss so callers fall through to the
/// store. An entry whose `version` differs from the identity's current
/// `permissions_version` is also a miss.
#[derive(Debug, Clone)]
pub struct PermissionCache {
    cache: Arc<CacheManager>,
    timeout: Duration,
    ttl: Duration,
}

impl PermissionCache {
    /// Creates a permission cache over the given cache manager.
    pub fn new(cache: Arc<CacheManager>, config: &AuthConfig) -> Self {
        Self {
            cache,
            timeout: config.cache_timeout(),
            ttl: config.permission_cache_ttl(),
        }
    }

    /// Look up the set for `user_id`, accepting it only at `version`.
    pub async fn get(&self, user_id: Uuid, version: i64) -> Option<EffectivePermissionSet> {
        let key = keys::permissions(user_id);
        let cached = bounded(
            self.timeout,
            "permission_cache.get",
            self.cache.get_json::<EffectivePermissionSet>(&key),
        )
        .await;

        match cached {
            Ok(Some(set)) if set.version == version && set.user_id == user_id => {
                debug!(user_id = %user_id, version, "Permission cache hit");
                Some(set)
            }
            Ok(Some(set)) => {
                debug!(
                    user_id = %user_id,
                    cached_version = set.version,
                    version,
                    "Discarding stale permission set"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Permission cache read failed, using store");
                None
            }
        }
    }

    /// Store a freshly computed set. Failures are logged and ignored.
    pub async fn put(&self, set: &EffectivePermissionSet) {
        let key = keys::permissions(set.user_id);
        let result = bounded(
            self.timeout,
            "permission_cache.set",
            self.cache.set_json(&key, set, self.ttl),
        )
        .await;

        if let Err(e) = result {
            warn!(user_id = %set.user_id, error = %e, "Permission cache write failed");
        }
    }

    /// Drop the cached set for `user_id`.
    ///
    /// A failed delete cannot leak a stale grant: the mutation that called
    /// this has already bumped the version the entry is checked against.
    pub async fn invalidate(&self, user_id: Uuid) {
        let key = keys::permissions(user_id);
        match bounded(self.timeout, "permission_cache.delete", self.cache.delete(&key)).await {
            Ok(()) => debug!(user_id = %user_id, "Permission cache invalidated"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Permission cache invalidation failed"),
        }
    }
}
