//! # gatekeeper
//!
//! Wires the credential store, the permission cache, and the
//! authentication core together by explicit injection. The binary and the
//! integration tests both build an [`AuthRuntime`] from an [`AppConfig`].

use std::sync::Arc;

use tracing::{info, warn};

use gatekeeper_auth::{
    AccountAdmin, AuthGate, PasswordHasher, PermissionAdmin, PermissionCache, PermissionGate,
    PermissionResolver, SessionManager,
};
use gatekeeper_cache::CacheManager;
use gatekeeper_core::config::AppConfig;
use gatekeeper_core::error::AppError;
use gatekeeper_core::result::AppResult;
use gatekeeper_core::traits::CacheProvider;
use gatekeeper_database::migration::run_migrations;
use gatekeeper_database::{CredentialStores, DatabasePool};

/// Every service of the authentication core, sharing one set of stores
/// and one cache.
#[derive(Debug, Clone)]
pub struct AuthRuntime {
    /// Credential store handles.
    pub stores: CredentialStores,
    /// Cache backend.
    pub cache: Arc<CacheManager>,
    /// Register, login, refresh, logout, password change.
    pub sessions: SessionManager,
    /// Effective permission resolution.
    pub resolver: PermissionResolver,
    /// Catalog and assignment management.
    pub permissions: PermissionAdmin,
    /// Identity, status, role, and tenant management.
    pub accounts: AccountAdmin,
    /// Bearer header to identity context.
    pub auth_gate: AuthGate,
    /// Identity context plus requirement to allow or deny.
    pub permission_gate: PermissionGate,
    /// Open pool when running on PostgreSQL.
    pub database: Option<DatabasePool>,
}

impl AuthRuntime {
    /// Connect the configured store and cache, then build every service.
    ///
    /// An unreachable store is returned as an error; the caller decides
    /// whether that is fatal.
    pub async fn build(config: &AppConfig) -> AppResult<Self> {
        if config.auth.uses_placeholder_secret() {
            warn!("auth.jwt_secret is the shipped placeholder; set GATEKEEPER__AUTH__JWT_SECRET");
        }

        let (stores, database) = match config.database.backend.as_str() {
            "memory" => {
                info!("Using in-memory credential store");
                (CredentialStores::in_memory(), None)
            }
            "postgres" => {
                let pool = DatabasePool::connect(&config.database).await?;
                if !pool.health_check().await? {
                    warn!("Database health check did not return the expected row");
                }
                run_migrations(pool.pool()).await?;
                (CredentialStores::postgres(pool.pool().clone()), Some(pool))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown database backend: '{other}'. Use 'memory' or 'postgres'"
                )));
            }
        };

        info!(provider = %config.cache.provider, "Initializing cache");
        let cache = Arc::new(CacheManager::new(&config.cache).await?);
        match cache.health_check().await {
            Ok(true) => {}
            Ok(false) => warn!("Cache health check failed; permission checks will read the store"),
            Err(e) => warn!(error = %e, "Cache unreachable; permission checks will read the store"),
        }

        let mut runtime = Self::assemble(stores, cache, config)?;
        runtime.database = database;
        Ok(runtime)
    }

    /// Build every service over already-constructed stores and cache.
    pub fn assemble(
        stores: CredentialStores,
        cache: Arc<CacheManager>,
        config: &AppConfig,
    ) -> AppResult<Self> {
        let auth = &config.auth;
        let hasher = PasswordHasher::new(auth)?;
        let permission_cache = PermissionCache::new(cache.clone(), auth);
        let resolver = PermissionResolver::new(stores.clone(), permission_cache.clone(), auth);

        let sessions =
            SessionManager::new(stores.clone(), hasher.clone(), permission_cache, auth)?;
        let permissions = PermissionAdmin::new(stores.clone(), resolver.clone(), auth);
        let accounts = AccountAdmin::new(stores.clone(), hasher, resolver.clone(), auth);
        let auth_gate = AuthGate::new(sessions.decoder().clone(), stores.clone(), auth);
        let permission_gate = PermissionGate::new(resolver.clone());

        Ok(Self {
            stores,
            cache,
            sessions,
            resolver,
            permissions,
            accounts,
            auth_gate,
            permission_gate,
            database: None,
        })
    }

    /// Seed the configured tenant and superadmin, if any.
    pub async fn bootstrap(&self, config: &AppConfig) -> AppResult<()> {
        match &config.bootstrap {
            Some(bootstrap) => self.accounts.bootstrap(bootstrap).await,
            None => Ok(()),
        }
    }

    /// Release store connections.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.database {
            pool.close().await;
        }
    }
}
