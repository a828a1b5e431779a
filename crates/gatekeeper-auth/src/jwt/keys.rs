//! Signing material for the two token profiles.

use sha2::{Digest, Sha256};

use gatekeeper_core::config::AuthConfig;

/// Raw HMAC secrets for each profile.
pub(crate) struct SigningSecrets {
    pub access: Vec<u8>,
    pub refresh: Vec<u8>,
}

impl SigningSecrets {
    /// Without a dedicated refresh secret, the refresh key is derived from
    /// the access secret so the profiles never verify each other's tokens.
    pub fn from_config(config: &AuthConfig) -> Self {
        let access = config.jwt_secret.as_bytes().to_vec();
        let refresh = match &config.jwt_refresh_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => format!("{}:refresh", config.jwt_secret).into_bytes(),
        };
        Self { access, refresh }
    }
}

/// SHA-256 hex digest of a token, the form in which refresh tokens are stored.
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
