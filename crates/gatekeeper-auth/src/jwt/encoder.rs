//! JWT token creation for both profiles.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gatekeeper_core::config::AuthConfig;
use gatekeeper_core::error::AppError;
use gatekeeper_core::result::AppResult;
use gatekeeper_entity::Identity;

use super::claims::{AccessClaims, RefreshClaims, TokenType};
use super::keys::SigningSecrets;

/// A freshly issued token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh tokens issued together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Creates signed access and refresh tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

fn token_ttl(
    setting: &str,
    value: u64,
    unit: fn(i64) -> Option<Duration>,
) -> AppResult<Duration> {
    i64::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .and_then(unit)
        .ok_or_else(|| AppError::configuration(format!("{setting} is out of range: {value}")))
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    ///
    /// Fails with a configuration error if either token lifetime is zero
    /// or does not fit a `Duration`.
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        let secrets = SigningSecrets::from_config(config);
        Ok(Self {
            access_key: EncodingKey::from_secret(&secrets.access),
            refresh_key: EncodingKey::from_secret(&secrets.refresh),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_ttl: token_ttl(
                "auth.access_ttl_minutes",
                config.access_ttl_minutes,
                Duration::try_minutes,
            )?,
            refresh_ttl: token_ttl(
                "auth.refresh_ttl_hours",
                config.refresh_ttl_hours,
                Duration::try_hours,
            )?,
        })
    }

    /// Issues an access token for `identity` valid for `ttl`.
    pub fn issue_access(&self, identity: &Identity, ttl: Duration) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = AccessClaims {
            sub: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            tenant_id: identity.tenant_id,
            status: identity.status,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
            typ: TokenType::Access,
        };

        let token = encode(&Header::default(), &claims, &self.access_key)
            .map_err(|e| AppError::internal(format!("Failed to encode access token: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Issues a refresh token for `identity` valid for `ttl`.
    pub fn issue_refresh(&self, identity: &Identity, ttl: Duration) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = RefreshClaims {
            sub: identity.id,
            email: identity.email.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
            typ: TokenType::Refresh,
        };

        let token = encode(&Header::default(), &claims, &self.refresh_key)
            .map_err(|e| AppError::internal(format!("Failed to encode refresh token: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Issues an access + refresh pair with the configured lifetimes.
    pub fn issue_pair(&self, identity: &Identity) -> AppResult<TokenPair> {
        let access = self.issue_access(identity, self.access_ttl)?;
        let refresh = self.issue_refresh(identity, self.refresh_ttl)?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }
}
