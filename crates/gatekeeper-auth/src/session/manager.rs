//! Session lifecycle manager: register, login, refresh, logout, password change.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use gatekeeper_core::config::AuthConfig;
use gatekeeper_core::deadline::bounded;
use gatekeeper_core::error::{AppError, reason};
use gatekeeper_core::result::AppResult;
use gatekeeper_database::CredentialStores;
use gatekeeper_entity::{Identity, IdentityProfile, NewIdentity, UserRole, normalize_email};

use crate::jwt::{JwtDecoder, JwtEncoder, TokenPair, token_digest};
use crate::password::validator::{validated_email, validated_name};
use crate::password::{PasswordHasher, PasswordValidator};
use crate::permission::PermissionCache;
use crate::status::{ensure_usable, is_usable};

/// Input to [`SessionManager::register`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Email; normalized before use.
    pub email: String,
    /// Plaintext password; checked against the policy.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Tenant to join. Must exist and be active.
    pub tenant_id: Uuid,
    /// Requested role. Defaults to `VIEWER`; `SUPER_ADMIN` is refused.
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Result of register, login, and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOutcome {
    /// The authenticated identity, without secrets.
    pub identity: IdentityProfile,
    /// Newly issued tokens.
    pub tokens: TokenPair,
}

/// Orchestrates every identity operation.
///
/// Holds exactly one refresh token per identity: each login, registration,
/// and refresh replaces the stored digest, and refresh rotation is a
/// compare-and-set so that only one of two concurrent refreshes with the
/// same token can win. Mutations are never retried.
#[derive(Clone)]
pub struct SessionManager {
    stores: CredentialStores,
    hasher: PasswordHasher,
    validator: PasswordValidator,
    encoder: JwtEncoder,
    decoder: JwtDecoder,
    permission_cache: PermissionCache,
    store_timeout: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("encoder", &self.encoder)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a new session manager with all required dependencies.
    pub fn new(
        stores: CredentialStores,
        hasher: PasswordHasher,
        permission_cache: PermissionCache,
        config: &AuthConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            stores,
            hasher,
            validator: PasswordValidator::new(config),
            encoder: JwtEncoder::new(config)?,
            decoder: JwtDecoder::new(config),
            permission_cache,
            store_timeout: config.store_timeout(),
        })
    }

    /// The encoder, for callers that need to mint tokens directly.
    pub fn encoder(&self) -> &JwtEncoder {
        &self.encoder
    }

    /// The decoder, shared with the authorization gate.
    pub fn decoder(&self) -> &JwtDecoder {
        &self.decoder
    }

    async fn store<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        bounded(self.store_timeout, operation, fut).await
    }

    /// Creates an ACTIVE identity and signs it in.
    pub async fn register(&self, registration: Registration) -> AppResult<AuthOutcome> {
        let email = validated_email(&registration.email)?;
        let name = validated_name(&registration.name)?;
        self.validator.validate(&registration.password)?;

        let role = registration.role.unwrap_or(UserRole::Viewer);
        if role.is_superadmin() {
            return Err(AppError::forbidden(
                reason::ROLE_NOT_ALLOWED,
                "The superadmin role cannot be self-assigned",
            ));
        }

        let tenant = self
            .store("tenant.find", self.stores.tenants.find_tenant(registration.tenant_id))
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Tenant {} not found", registration.tenant_id))
            })?;
        if !tenant.is_active {
            return Err(AppError::forbidden(
                reason::TENANT_INACTIVE,
                "Tenant is inactive",
            ));
        }

        let password_hash = self.hasher.hash(&registration.password).await?;
        let identity = self
            .store(
                "identity.create",
                self.stores.identities.create(NewIdentity {
                    email,
                    password_hash,
                    name,
                    role,
                    tenant_id: tenant.id,
                }),
            )
            .await?;

        let tokens = self.encoder.issue_pair(&identity)?;
        let digest = token_digest(&tokens.refresh_token);
        let stored = self
            .store(
                "identity.swap_refresh_token",
                self.stores
                    .identities
                    .swap_refresh_token(identity.id, None, Some(&digest)),
            )
            .await?;
        if !stored {
            return Err(AppError::internal(
                "Refresh token was set concurrently during registration",
            ));
        }

        info!(user_id = %identity.id, tenant_id = %identity.tenant_id, role = %identity.role, "Identity registered");
        Ok(AuthOutcome {
            identity: identity.profile(),
            tokens,
        })
    }

    /// Authenticates with email and password.
    ///
    /// Unknown email and wrong password fail identically, and take the
    /// same time: a hash is computed either way.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthOutcome> {
        let email = normalize_email(email);
        let account = self
            .store(
                "identity.find_account_by_email",
                self.stores.identities.find_account_by_email(&email),
            )
            .await?;

        let Some(account) = account else {
            let _ = self.hasher.hash(password).await;
            warn!("Login failed");
            return Err(AppError::invalid_credentials());
        };

        if !self
            .hasher
            .verify(password, &account.identity.password_hash)
            .await?
        {
            warn!(user_id = %account.identity.id, "Login failed");
            return Err(AppError::invalid_credentials());
        }

        if let Err(e) = ensure_usable(&account) {
            warn!(user_id = %account.identity.id, reason = ?e.reason, "Login refused");
            return Err(e);
        }

        let mut identity = account.identity;
        let tokens = self.encoder.issue_pair(&identity)?;
        let now = Utc::now();
        let recorded = self
            .store(
                "identity.record_login",
                self.stores.identities.record_login(
                    identity.id,
                    &identity.password_hash,
                    &token_digest(&tokens.refresh_token),
                    now,
                ),
            )
            .await?;
        if !recorded {
            return Err(self.login_superseded(identity.id).await);
        }
        identity.last_login_at = Some(now);

        info!(user_id = %identity.id, tenant_id = %identity.tenant_id, "Login successful");
        Ok(AuthOutcome {
            identity: identity.profile(),
            tokens,
        })
    }

    /// Exchanges the current refresh token for a new pair.
    ///
    /// The presented token must be the one currently stored. A superseded
    /// or logged-out token is rejected as `Unauthorized`.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthOutcome> {
        let claims = self.decoder.verify_refresh(refresh_token)?;

        let account = self
            .store("identity.find_account", self.stores.identities.find_account(claims.sub))
            .await?
            .ok_or_else(|| AppError::unauthorized("Refresh token subject no longer exists"))?;

        let presented = token_digest(refresh_token);
        if !account.identity.holds_refresh_token(&presented) {
            warn!(user_id = %claims.sub, "Refresh token replay or superseded token rejected");
            return Err(refresh_mismatch());
        }

        ensure_usable(&account)?;

        let identity = account.identity;
        let tokens = self.encoder.issue_pair(&identity)?;
        let rotated = self
            .store(
                "identity.swap_refresh_token",
                self.stores.identities.swap_refresh_token(
                    identity.id,
                    Some(&presented),
                    Some(&token_digest(&tokens.refresh_token)),
                ),
            )
            .await?;

        if !rotated {
            warn!(user_id = %identity.id, "Concurrent refresh lost the rotation race");
            return Err(refresh_mismatch());
        }

        info!(user_id = %identity.id, "Refresh token rotated");
        Ok(AuthOutcome {
            identity: identity.profile(),
            tokens,
        })
    }

    /// Clears the stored refresh token and the cached permission set.
    /// Idempotent.
    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.store(
            "identity.clear_refresh_token",
            self.stores.identities.clear_refresh_token(user_id),
        )
        .await?;
        self.permission_cache.invalidate(user_id).await;
        info!(user_id = %user_id, "Logged out");
        Ok(())
    }

    /// Replaces the password after checking the current one. Every
    /// outstanding refresh token stops working.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let identity = self.find_identity(user_id).await?;

        if !self
            .hasher
            .verify(current_password, &identity.password_hash)
            .await?
        {
            warn!(user_id = %user_id, "Password change refused: wrong current password");
            return Err(AppError::invalid_credentials());
        }

        self.validator
            .validate_not_same(current_password, new_password)?;
        self.validator.validate(new_password)?;

        let new_hash = self.hasher.hash(new_password).await?;
        self.store(
            "identity.update_password",
            self.stores
                .identities
                .update_password(user_id, &new_hash, Utc::now()),
        )
        .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// True only if the identity exists, is ACTIVE, and its tenant is active.
    pub async fn verify_session_validity(&self, user_id: Uuid) -> AppResult<bool> {
        let account = self
            .store("identity.find_account", self.stores.identities.find_account(user_id))
            .await?;
        Ok(account.as_ref().is_some_and(is_usable))
    }

    /// The error for a login whose account changed between the password
    /// check and the token write: the status gate if it now fails,
    /// otherwise the password was replaced.
    async fn login_superseded(&self, user_id: Uuid) -> AppError {
        let current = self
            .store("identity.find_account", self.stores.identities.find_account(user_id))
            .await;
        let error = match current {
            Ok(Some(account)) => ensure_usable(&account)
                .err()
                .unwrap_or_else(AppError::invalid_credentials),
            Ok(None) => AppError::invalid_credentials(),
            Err(e) => e,
        };
        warn!(user_id = %user_id, reason = ?error.reason, "Login superseded by a concurrent account change");
        error
    }

    async fn find_identity(&self, user_id: Uuid) -> AppResult<Identity> {
        self.store("identity.find_by_id", self.stores.identities.find_by_id(user_id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Identity {user_id} not found")))
    }
}

fn refresh_mismatch() -> AppError {
    AppError::unauthorized("Refresh token is no longer valid").with_reason(reason::REFRESH_TOKEN_MISMATCH)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::DateTime;
    use gatekeeper_cache::CacheManager;
    use gatekeeper_core::ErrorKind;
    use gatekeeper_core::config::CacheConfig;
    use gatekeeper_database::{
        IdentityStore, IdentityWithTenant, MemoryCredentialStore, TenantStore,
    };
    use gatekeeper_entity::UserStatus;

    use super::*;

    const PASSWORD: &str = "Secret@123";

    struct Fixture {
        stores: CredentialStores,
        sessions: SessionManager,
        tenant_id: Uuid,
    }

    fn test_config() -> AuthConfig {
        AuthConfig {
            hash_memory_kib: 1024,
            hash_iterations: 1,
            ..AuthConfig::default()
        }
    }

    async fn sessions_over(stores: CredentialStores, config: &AuthConfig) -> SessionManager {
        let manager = CacheManager::new(&CacheConfig::default()).await.unwrap();
        let cache = PermissionCache::new(Arc::new(manager), config);
        SessionManager::new(stores, PasswordHasher::new(config).unwrap(), cache, config).unwrap()
    }

    async fn fixture() -> Fixture {
        let config = test_config();
        let stores = CredentialStores::in_memory();
        let tenant = stores.tenants.create_tenant("Acme").await.unwrap();
        let sessions = sessions_over(stores.clone(), &config).await;
        Fixture {
            stores,
            sessions,
            tenant_id: tenant.id,
        }
    }

    /// What happens to an account right after login has read it.
    #[derive(Debug, Clone, Copy)]
    enum Interleave {
        Suspend,
        ReplacePassword,
    }

    /// Identity store that applies an admin change immediately after the
    /// account snapshot is taken, before login writes its token.
    #[derive(Debug)]
    struct InterleavedIdentities {
        inner: Arc<MemoryCredentialStore>,
        interleave: Interleave,
    }

    #[async_trait]
    impl IdentityStore for InterleavedIdentities {
        async fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Identity>> {
            self.inner.find_by_id(id).await
        }

        async fn find_account_by_email(
            &self,
            email: &str,
        ) -> AppResult<Option<IdentityWithTenant>> {
            let snapshot = self.inner.find_account_by_email(email).await?;
            if let Some(account) = &snapshot {
                let id = account.identity.id;
                match self.interleave {
                    Interleave::Suspend => {
                        self.inner
                            .update_status(id, UserStatus::Suspended, Some("chargeback"))
                            .await?
                    }
                    Interleave::ReplacePassword => {
                        self.inner.update_password(id, "replaced", Utc::now()).await?
                    }
                }
            }
            Ok(snapshot)
        }

        async fn find_account(&self, id: Uuid) -> AppResult<Option<IdentityWithTenant>> {
            self.inner.find_account(id).await
        }

        async fn create(&self, new: NewIdentity) -> AppResult<Identity> {
            self.inner.create(new).await
        }

        async fn record_login(
            &self,
            id: Uuid,
            expected_password_hash: &str,
            refresh_hash: &str,
            at: DateTime<Utc>,
        ) -> AppResult<bool> {
            self.inner
                .record_login(id, expected_password_hash, refresh_hash, at)
                .await
        }

        async fn swap_refresh_token(
            &self,
            id: Uuid,
            expected: Option<&str>,
            new: Option<&str>,
        ) -> AppResult<bool> {
            self.inner.swap_refresh_token(id, expected, new).await
        }

        async fn clear_refresh_token(&self, id: Uuid) -> AppResult<()> {
            self.inner.clear_refresh_token(id).await
        }

        async fn update_password(
            &self,
            id: Uuid,
            password_hash: &str,
            at: DateTime<Utc>,
        ) -> AppResult<()> {
            self.inner.update_password(id, password_hash, at).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            status: UserStatus,
            reason: Option<&str>,
        ) -> AppResult<()> {
            self.inner.update_status(id, status, reason).await
        }

        async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<()> {
            self.inner.update_role(id, role).await
        }

        async fn delete(&self, id: Uuid) -> AppResult<bool> {
            self.inner.delete(id).await
        }

        async fn superadmin_exists(&self) -> AppResult<bool> {
            self.inner.superadmin_exists().await
        }
    }

    /// Registers Ann through a plain store, then returns a manager whose
    /// logins race against `interleave`.
    async fn interleaved(
        interleave: Interleave,
    ) -> (Arc<MemoryCredentialStore>, SessionManager, Uuid) {
        let config = test_config();
        let memory = Arc::new(MemoryCredentialStore::new());
        let tenant = memory.create_tenant("Acme").await.unwrap();
        let plain = sessions_over(CredentialStores::from_memory(memory.clone()), &config).await;
        let id = plain.register(registration(tenant.id)).await.unwrap().identity.id;
        plain.logout(id).await.unwrap();

        let stores = CredentialStores {
            identities: Arc::new(InterleavedIdentities {
                inner: memory.clone(),
                interleave,
            }),
            tenants: memory.clone(),
            permissions: memory.clone(),
        };
        (memory, sessions_over(stores, &config).await, id)
    }

    fn registration(tenant_id: Uuid) -> Registration {
        Registration {
            email: "  Ann@Acme.test ".into(),
            password: PASSWORD.into(),
            name: "Ann".into(),
            tenant_id,
            role: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let f = fixture().await;
        let registered = f.sessions.register(registration(f.tenant_id)).await.unwrap();
        assert_eq!(registered.identity.email, "ann@acme.test");
        assert_eq!(registered.identity.role, UserRole::Viewer);
        assert_eq!(registered.identity.status, UserStatus::Active);

        let outcome = f.sessions.login("ANN@acme.test", PASSWORD).await.unwrap();
        assert_eq!(outcome.identity.id, registered.identity.id);
        assert!(outcome.identity.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_register_rejects_superadmin_and_duplicates() {
        let f = fixture().await;
        let mut req = registration(f.tenant_id);
        req.role = Some(UserRole::SuperAdmin);
        let err = f.sessions.register(req).await.unwrap_err();
        assert_eq!(err.reason, Some(reason::ROLE_NOT_ALLOWED));

        f.sessions.register(registration(f.tenant_id)).await.unwrap();
        let err = f.sessions.register(registration(f.tenant_id)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_into_unknown_or_inactive_tenant() {
        let f = fixture().await;
        let err = f.sessions.register(registration(Uuid::new_v4())).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        f.stores.tenants.set_tenant_active(f.tenant_id, false).await.unwrap();
        let err = f.sessions.register(registration(f.tenant_id)).await.unwrap_err();
        assert_eq!(err.reason, Some(reason::TENANT_INACTIVE));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = fixture().await;
        f.sessions.register(registration(f.tenant_id)).await.unwrap();

        let unknown = f.sessions.login("bob@acme.test", PASSWORD).await.unwrap_err();
        let wrong = f.sessions.login("ann@acme.test", "Wrong@123").await.unwrap_err();
        assert_eq!(unknown.kind, ErrorKind::InvalidCredentials);
        assert_eq!(unknown.to_response(), wrong.to_response());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_replay() {
        let f = fixture().await;
        let first = f.sessions.register(registration(f.tenant_id)).await.unwrap();
        let second = f.sessions.refresh(&first.tokens.refresh_token).await.unwrap();
        assert_ne!(first.tokens.refresh_token, second.tokens.refresh_token);

        let err = f.sessions.refresh(&first.tokens.refresh_token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(err.reason, Some(reason::REFRESH_TOKEN_MISMATCH));

        assert!(f.sessions.refresh(&second.tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let f = fixture().await;
        let first = f.sessions.register(registration(f.tenant_id)).await.unwrap();
        let token = first.tokens.refresh_token;

        let (a, b) = tokio::join!(f.sessions.refresh(&token), f.sessions.refresh(&token));
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let f = fixture().await;
        let outcome = f.sessions.register(registration(f.tenant_id)).await.unwrap();
        let err = f.sessions.refresh(&outcome.tokens.access_token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_kills_refresh() {
        let f = fixture().await;
        let outcome = f.sessions.register(registration(f.tenant_id)).await.unwrap();
        f.sessions.logout(outcome.identity.id).await.unwrap();
        f.sessions.logout(outcome.identity.id).await.unwrap();
        f.sessions.logout(Uuid::new_v4()).await.unwrap();

        let err = f.sessions.refresh(&outcome.tokens.refresh_token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_change_password() {
        let f = fixture().await;
        let outcome = f.sessions.register(registration(f.tenant_id)).await.unwrap();
        let id = outcome.identity.id;

        let err = f.sessions.change_password(id, "Wrong@123", "Better@456").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);
        let err = f.sessions.change_password(id, PASSWORD, PASSWORD).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = f.sessions.change_password(id, PASSWORD, "weak").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        f.sessions.change_password(id, PASSWORD, "Better@456").await.unwrap();
        assert!(f.sessions.refresh(&outcome.tokens.refresh_token).await.is_err());
        assert!(f.sessions.login("ann@acme.test", PASSWORD).await.is_err());
        assert!(f.sessions.login("ann@acme.test", "Better@456").await.is_ok());
    }

    #[tokio::test]
    async fn test_suspended_identity_cannot_login_or_refresh() {
        let f = fixture().await;
        let outcome = f.sessions.register(registration(f.tenant_id)).await.unwrap();
        let id = outcome.identity.id;
        assert!(f.sessions.verify_session_validity(id).await.unwrap());

        f.stores
            .identities
            .update_status(id, UserStatus::Suspended, Some("audit"))
            .await
            .unwrap();

        let err = f.sessions.login("ann@acme.test", PASSWORD).await.unwrap_err();
        assert_eq!(err.reason, Some(reason::ACCOUNT_SUSPENDED));
        assert!(f.sessions.refresh(&outcome.tokens.refresh_token).await.is_err());
        assert!(!f.sessions.verify_session_validity(id).await.unwrap());
        assert!(!f.sessions.verify_session_validity(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_racing_suspension_stores_no_token() {
        let (memory, sessions, id) = interleaved(Interleave::Suspend).await;

        let err = sessions.login("ann@acme.test", PASSWORD).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(err.reason, Some(reason::ACCOUNT_SUSPENDED));

        let stored = memory.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Suspended);
        assert!(stored.refresh_token_hash.is_none());
        assert!(stored.last_login_at.is_none());
    }

    #[tokio::test]
    async fn test_login_racing_password_change_stores_no_token() {
        let (memory, sessions, id) = interleaved(Interleave::ReplacePassword).await;

        let err = sessions.login("ann@acme.test", PASSWORD).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredentials);

        let stored = memory.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "replaced");
        assert!(stored.refresh_token_hash.is_none());
    }
}
