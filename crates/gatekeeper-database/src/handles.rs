//! Bundled store handles handed to the authentication core.

use std::sync::Arc;

use sqlx::PgPool;

use crate::memory::MemoryCredentialStore;
use crate::repositories::{PermissionRepository, TenantRepository, UserRepository};
use crate::store::{IdentityStore, PermissionStore, TenantStore};

/// The three credential-store seams, injected together.
#[derive(Debug, Clone)]
pub struct CredentialStores {
    /// Identity persistence.
    pub identities: Arc<dyn IdentityStore>,
    /// Tenant persistence.
    pub tenants: Arc<dyn TenantStore>,
    /// Catalog and assignment persistence.
    pub permissions: Arc<dyn PermissionStore>,
}

impl CredentialStores {
    /// All three seams backed by one shared in-memory store.
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryCredentialStore::new()))
    }

    /// All three seams backed by the given in-memory store.
    pub fn from_memory(store: Arc<MemoryCredentialStore>) -> Self {
        Self {
            identities: store.clone(),
            tenants: store.clone(),
            permissions: store,
        }
    }

    /// PostgreSQL repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            identities: Arc::new(UserRepository::new(pool.clone())),
            tenants: Arc::new(TenantRepository::new(pool.clone())),
            permissions: Arc::new(PermissionRepository::new(pool)),
        }
    }
}
