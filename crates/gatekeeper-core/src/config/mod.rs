//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod database;
pub mod logging;

use serde::{Deserialize, Serialize};

pub use self::auth::{
    AuthConfig, MAX_ACCESS_TTL_MINUTES, MAX_REFRESH_TTL_HOURS, PLACEHOLDER_JWT_SECRET,
};
pub use self::bootstrap::BootstrapConfig;
pub use self::cache::CacheConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// (default.toml + environment overlay + `GATEKEEPER__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token, password, and timeout settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// First-run tenant and superadmin seeding.
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default`, then `config/{env}`, then environment
    /// variables prefixed with `GATEKEEPER` (separator `__`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("GATEKEEPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects configurations that would weaken the token scheme.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.auth.jwt_secret.len() < 32 {
            return Err(AppError::configuration(
                "auth.jwt_secret must be at least 32 bytes",
            ));
        }
        if let Some(refresh) = &self.auth.jwt_refresh_secret {
            if refresh.len() < 32 {
                return Err(AppError::configuration(
                    "auth.jwt_refresh_secret must be at least 32 bytes",
                ));
            }
        }
        if !(1..=MAX_ACCESS_TTL_MINUTES).contains(&self.auth.access_ttl_minutes) {
            return Err(AppError::configuration(format!(
                "auth.access_ttl_minutes must be between 1 and {MAX_ACCESS_TTL_MINUTES}"
            )));
        }
        if !(1..=MAX_REFRESH_TTL_HOURS).contains(&self.auth.refresh_ttl_hours) {
            return Err(AppError::configuration(format!(
                "auth.refresh_ttl_hours must be between 1 and {MAX_REFRESH_TTL_HOURS}"
            )));
        }
        if self.auth.permission_cache_ttl_seconds == 0 {
            return Err(AppError::configuration(
                "auth.permission_cache_ttl_seconds must be positive",
            ));
        }
        Ok(())
    }

    /// Refuses the shipped placeholder secret outside `development`.
    pub fn validate_for_environment(&self, env: &str) -> Result<(), AppError> {
        if env != "development" && self.auth.uses_placeholder_secret() {
            return Err(AppError::configuration(format!(
                "auth.jwt_secret is still the shipped placeholder in '{env}'"
            )));
        }
        Ok(())
    }
}
