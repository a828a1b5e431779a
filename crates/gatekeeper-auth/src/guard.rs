//! Per-request gates: bearer authentication and permission requirements.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use gatekeeper_core::config::AuthConfig;
use gatekeeper_core::deadline::bounded;
use gatekeeper_core::error::{AppError, reason};
use gatekeeper_core::result::AppResult;
use gatekeeper_database::CredentialStores;
use gatekeeper_entity::{PermissionTuple, UserRole, UserStatus};

use crate::jwt::JwtDecoder;
use crate::permission::PermissionResolver;
use crate::status::ensure_usable;

const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated caller, as seen by downstream operations.
///
/// Built from the identity as it is stored now, not from the token's
/// claim snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    /// The authenticated identity's ID.
    pub user_id: Uuid,
    /// Current email.
    pub email: String,
    /// Current role.
    pub role: UserRole,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Current status. Always `ACTIVE` for a context returned by [`AuthGate`].
    pub status: UserStatus,
}

impl IdentityContext {
    /// Whether the caller is a superadmin.
    pub fn is_superadmin(&self) -> bool {
        self.role.is_superadmin()
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// A missing header and a header that is not a non-empty bearer credential
/// are reported with different reasons, and neither is `TokenInvalid`.
pub fn extract_bearer(header: Option<&str>) -> AppResult<&str> {
    let header = header.ok_or_else(|| {
        AppError::unauthorized("Missing Authorization header").with_reason(reason::MISSING_AUTH_HEADER)
    })?;

    match header.strip_prefix(BEARER_PREFIX).map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AppError::unauthorized("Invalid Authorization header format")
            .with_reason(reason::MALFORMED_AUTH_HEADER)),
    }
}

/// Turns a bearer header into an [`IdentityContext`].
#[derive(Debug, Clone)]
pub struct AuthGate {
    decoder: JwtDecoder,
    stores: CredentialStores,
    store_timeout: Duration,
}

impl AuthGate {
    /// Creates a gate over the given decoder and stores.
    pub fn new(decoder: JwtDecoder, stores: CredentialStores, config: &AuthConfig) -> Self {
        Self {
            decoder,
            stores,
            store_timeout: config.store_timeout(),
        }
    }

    /// Authenticate a request from its `Authorization` header value.
    pub async fn authenticate(&self, header: Option<&str>) -> AppResult<IdentityContext> {
        let token = extract_bearer(header)?;
        let claims = self.decoder.verify_access(token)?;

        let account = bounded(
            self.store_timeout,
            "identity.find_account",
            self.stores.identities.find_account(claims.sub),
        )
        .await?
        .ok_or_else(|| AppError::unauthorized("Token subject no longer exists"))?;

        ensure_usable(&account)?;

        let identity = account.identity;
        debug!(user_id = %identity.id, "Request authenticated");
        Ok(IdentityContext {
            user_id: identity.id,
            email: identity.email,
            role: identity.role,
            tenant_id: identity.tenant_id,
            status: identity.status,
        })
    }
}

/// Enforces permission requirements for an authenticated caller.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    resolver: PermissionResolver,
}

impl PermissionGate {
    /// Creates a gate over the given resolver.
    pub fn new(resolver: PermissionResolver) -> Self {
        Self { resolver }
    }

    /// Require a single tuple.
    pub async fn require(&self, ctx: &IdentityContext, tuple: &PermissionTuple) -> AppResult<()> {
        let allowed = self.resolver.check(ctx.user_id, tuple).await?;
        deny_unless(allowed, ctx, || tuple.to_string())
    }

    /// Require at least one of `tuples`.
    pub async fn require_any(
        &self,
        ctx: &IdentityContext,
        tuples: &[PermissionTuple],
    ) -> AppResult<()> {
        let allowed = self.resolver.check_any(ctx.user_id, tuples).await?;
        deny_unless(allowed, ctx, || join(tuples, " | "))
    }

    /// Require every one of `tuples`.
    pub async fn require_all(
        &self,
        ctx: &IdentityContext,
        tuples: &[PermissionTuple],
    ) -> AppResult<()> {
        let allowed = self.resolver.check_all(ctx.user_id, tuples).await?;
        deny_unless(allowed, ctx, || join(tuples, " & "))
    }
}

fn deny_unless(
    allowed: bool,
    ctx: &IdentityContext,
    requirement: impl FnOnce() -> String,
) -> AppResult<()> {
    if allowed {
        return Ok(());
    }
    let requirement = requirement();
    debug!(user_id = %ctx.user_id, requirement = %requirement, "Permission denied");
    Err(AppError::forbidden(
        reason::INSUFFICIENT_PERMISSION,
        format!("Missing permission: {requirement}"),
    ))
}

fn join(tuples: &[PermissionTuple], sep: &str) -> String {
    tuples
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}
