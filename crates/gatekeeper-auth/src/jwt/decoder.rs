//! JWT token verification for both profiles.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::de::DeserializeOwned;

use gatekeeper_core::config::AuthConfig;
use gatekeeper_core::error::AppError;
use gatekeeper_core::result::AppResult;

use super::claims::{AccessClaims, RefreshClaims, TokenType};
use super::keys::SigningSecrets;

/// Verifies access and refresh tokens.
///
/// Checks signature, expiry (with leeway), issuer, audience, and the
/// `typ` purpose claim. Expiry is reported as `TokenExpired`; every other
/// failure is `TokenInvalid`.
#[derive(Clone)]
pub struct JwtDecoder {
    access_key: DecodingKey,
    refresh_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let secrets = SigningSecrets::from_config(config);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            access_key: DecodingKey::from_secret(&secrets.access),
            refresh_key: DecodingKey::from_secret(&secrets.refresh),
            validation,
        }
    }

    /// Verifies an access token and returns its claims.
    pub fn verify_access(&self, token: &str) -> AppResult<AccessClaims> {
        let claims: AccessClaims = self.decode_with(token, &self.access_key)?;
        if claims.typ != TokenType::Access {
            return Err(AppError::token_invalid("Expected an access token"));
        }
        Ok(claims)
    }

    /// Verifies a refresh token and returns its claims.
    pub fn verify_refresh(&self, token: &str) -> AppResult<RefreshClaims> {
        let claims: RefreshClaims = self.decode_with(token, &self.refresh_key)?;
        if claims.typ != TokenType::Refresh {
            return Err(AppError::token_invalid("Expected a refresh token"));
        }
        Ok(claims)
    }

    fn decode_with<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> AppResult<T> {
        decode::<T>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => AppError::token_expired("Token has expired"),
                JwtErrorKind::InvalidSignature => AppError::token_invalid("Invalid token signature"),
                JwtErrorKind::InvalidIssuer | JwtErrorKind::InvalidAudience => {
                    AppError::token_invalid("Token was not issued for this service")
                }
                _ => AppError::token_invalid("Malformed token"),
            })
    }
}
