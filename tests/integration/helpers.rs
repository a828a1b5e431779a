//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use gatekeeper::AuthRuntime;
use gatekeeper_auth::{AuthOutcome, IdentityContext, Registration};
use gatekeeper_cache::CacheManager;
use gatekeeper_core::config::AppConfig;
use gatekeeper_database::CredentialStores;
use gatekeeper_entity::{PermissionTuple, UserRole, UserStatus};

/// Password used by every identity the helpers create.
pub const PASSWORD: &str = "Secret@123";

/// Test application context
pub struct TestApp {
    /// Every wired service.
    pub runtime: AuthRuntime,
    /// Application config
    pub config: AppConfig,
    /// An active tenant created for the test.
    pub tenant_id: Uuid,
}

impl TestApp {
    /// Create a new test application on the in-memory store and cache.
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "integration-test-secret-at-least-32-bytes".into();
        config.auth.hash_memory_kib = 1024;
        config.auth.hash_iterations = 1;

        let cache = Arc::new(
            CacheManager::new(&config.cache)
                .await
                .expect("Failed to init cache"),
        );
        let runtime = AuthRuntime::assemble(CredentialStores::in_memory(), cache, &config)
            .expect("Failed to assemble runtime");

        let tenant = runtime
            .accounts
            .create_tenant("Acme")
            .await
            .expect("Failed to create tenant");

        Self {
            runtime,
            config,
            tenant_id: tenant.id,
        }
    }

    /// Self-register an identity with the given email and role.
    pub async fn register(&self, email: &str, role: UserRole) -> AuthOutcome {
        self.runtime
            .sessions
            .register(Registration {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                name: "Test User".to_string(),
                tenant_id: self.tenant_id,
                role: Some(role),
            })
            .await
            .expect("Failed to register")
    }

    /// Create a superadmin directly in the store.
    pub async fn create_superadmin(&self, email: &str) -> Uuid {
        let outcome = self.register(email, UserRole::Admin).await;
        self.runtime
            .stores
            .identities
            .update_role(outcome.identity.id, UserRole::SuperAdmin)
            .await
            .expect("Failed to promote");
        outcome.identity.id
    }

    /// A context acting as the given identity with the given role.
    pub fn actor(&self, user_id: Uuid, role: UserRole) -> IdentityContext {
        IdentityContext {
            user_id,
            email: "actor@acme.test".to_string(),
            role,
            tenant_id: self.tenant_id,
            status: UserStatus::Active,
        }
    }

    /// Add a grant to the catalog.
    pub async fn create_grant(&self, module: &str, action: &str, resource: &str) -> PermissionTuple {
        let tuple = PermissionTuple::new(module, action, resource);
        self.runtime
            .permissions
            .create_grant(&tuple, "test grant")
            .await
            .expect("Failed to create grant");
        tuple
    }

    /// Authorization header value for an access token.
    pub fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }
}
