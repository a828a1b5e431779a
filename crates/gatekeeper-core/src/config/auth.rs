//! Authentication configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shipped value of `jwt_secret`; deployments must override it.
pub const PLACEHOLDER_JWT_SECRET: &str = "CHANGE_ME_IN_PRODUCTION_CHANGE_ME_IN_PRODUCTION";

/// Longest accepted access-token lifetime: one day.
pub const MAX_ACCESS_TTL_MINUTES: u64 = 24 * 60;

/// Longest accepted refresh-token lifetime: one year.
pub const MAX_REFRESH_TTL_HOURS: u64 = 24 * 365;

/// Token, credential, and collaborator-deadline configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for access-token signing (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Separate secret for refresh tokens. When absent, a key derived from
    /// `jwt_secret` is used so the two profiles never cross-verify.
    #[serde(default)]
    pub jwt_refresh_secret: Option<String>,
    /// `iss` claim written and required on every token.
    #[serde(default = "default_issuer")]
    pub jwt_issuer: String,
    /// `aud` claim written and required on every token.
    #[serde(default = "default_audience")]
    pub jwt_audience: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,
    /// Refresh token TTL in hours.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_hours: u64,
    /// Clock-skew leeway applied to `exp`, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
    /// Minimum password length.
    #[serde(default = "default_password_min")]
    pub password_min_length: usize,
    /// Argon2id memory cost in KiB.
    #[serde(default = "default_hash_memory")]
    pub hash_memory_kib: u32,
    /// Argon2id iteration count.
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    /// Argon2id lanes.
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
    /// Deadline for a single credential-store call, in milliseconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    /// Deadline for a single cache call, in milliseconds.
    #[serde(default = "default_cache_timeout")]
    pub cache_timeout_ms: u64,
    /// TTL of a cached effective permission set, in seconds.
    #[serde(default = "default_permission_ttl")]
    pub permission_cache_ttl_seconds: u64,
}

impl AuthConfig {
    /// Store deadline as a `Duration`.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Cache deadline as a `Duration`.
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    /// Permission cache TTL as a `Duration`.
    pub fn permission_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_cache_ttl_seconds)
    }

    /// Whether the access secret is still the shipped placeholder.
    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret == PLACEHOLDER_JWT_SECRET
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_hours", &self.refresh_ttl_hours)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("cache_timeout_ms", &self.cache_timeout_ms)
            .field("permission_cache_ttl_seconds", &self.permission_cache_ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_refresh_secret: None,
            jwt_issuer: default_issuer(),
            jwt_audience: default_audience(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_hours: default_refresh_ttl(),
            leeway_seconds: default_leeway(),
            password_min_length: default_password_min(),
            hash_memory_kib: default_hash_memory(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
            store_timeout_ms: default_store_timeout(),
            cache_timeout_ms: default_cache_timeout(),
            permission_cache_ttl_seconds: default_permission_ttl(),
        }
    }
}

fn default_jwt_secret() -> String {
    PLACEHOLDER_JWT_SECRET.to_string()
}

fn default_issuer() -> String {
    "gatekeeper".to_string()
}

fn default_audience() -> String {
    "gatekeeper-api".to_string()
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    168
}

fn default_leeway() -> u64 {
    5
}

fn default_password_min() -> usize {
    8
}

// 64 MiB / 3 passes lands in the same latency band as bcrypt cost 12.
fn default_hash_memory() -> u32 {
    65536
}

fn default_hash_iterations() -> u32 {
    3
}

fn default_hash_parallelism() -> u32 {
    1
}

fn default_store_timeout() -> u64 {
    2000
}

fn default_cache_timeout() -> u64 {
    250
}

fn default_permission_ttl() -> u64 {
    1800
}
