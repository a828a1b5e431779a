//! Unified application error types for Gatekeeper.
//!
//! Every crate maps its internal failures into [`AppError`] so that a
//! request boundary can turn any of them into a structured response with
//! a stable machine-readable kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Login failed. Deliberately does not say whether the account exists.
    InvalidCredentials,
    /// A token was well-formed and correctly signed but is past its expiry.
    TokenExpired,
    /// A token was malformed, badly signed, or issued for another profile.
    TokenInvalid,
    /// Authentication context is missing or a refresh token does not match.
    Unauthorized,
    /// The caller is authenticated but not allowed to proceed.
    Forbidden,
    /// A conflict occurred (duplicate email, duplicate assignment, etc.).
    Conflict,
    /// The requested identity, tenant, or grant was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// An internal error occurred (hashing, signing, invariant breach).
    Internal,
    /// The credential store failed.
    Database,
    /// The cache backend failed.
    Cache,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A collaborator did not answer within its deadline.
    ServiceUnavailable,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Internal => "INTERNAL",
            Self::Database => "DATABASE",
            Self::Cache => "CACHE",
            Self::Configuration => "CONFIGURATION",
            Self::Serialization => "SERIALIZATION",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Whether an operation failing with this kind may succeed on a retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database | Self::Cache | Self::ServiceUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Stable reason codes attached to `Forbidden` and `Unauthorized` errors.
pub mod reason {
    /// The identity has been deactivated.
    pub const ACCOUNT_INACTIVE: &str = "ACCOUNT_INACTIVE";
    /// The identity has been suspended.
    pub const ACCOUNT_SUSPENDED: &str = "ACCOUNT_SUSPENDED";
    /// The identity's tenant has been deactivated.
    pub const TENANT_INACTIVE: &str = "TENANT_INACTIVE";
    /// The identity lacks the required permission tuple(s).
    pub const INSUFFICIENT_PERMISSION: &str = "INSUFFICIENT_PERMISSION";
    /// The target is a superadmin and the operation does not apply to it.
    pub const SUPERADMIN_PROTECTED: &str = "SUPERADMIN_PROTECTED";
    /// An identity attempted to delete itself.
    pub const SELF_DELETION: &str = "SELF_DELETION";
    /// The requested role may not be assigned through this path.
    pub const ROLE_NOT_ALLOWED: &str = "ROLE_NOT_ALLOWED";
    /// No authorization header was supplied.
    pub const MISSING_AUTH_HEADER: &str = "MISSING_AUTH_HEADER";
    /// The authorization header is not a bearer credential.
    pub const MALFORMED_AUTH_HEADER: &str = "MALFORMED_AUTH_HEADER";
    /// The presented refresh token is not the currently stored one.
    pub const REFRESH_TOKEN_MISMATCH: &str = "REFRESH_TOKEN_MISMATCH";
}

/// The unified application error used throughout Gatekeeper.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional stable sub-code (see [`reason`]).
    pub reason: Option<&'static str>,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Structured failure body handed to the request boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error kind.
    pub error: String,
    /// Machine-readable sub-code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reason: None,
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            reason: None,
            source: Some(Box::new(source)),
        }
    }

    /// Attach a stable reason code.
    pub fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Uniform login failure. The message never varies.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorKind::InvalidCredentials, "Invalid email or password")
    }

    /// Create a token-expired error.
    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenExpired, message)
    }

    /// Create a token-invalid error.
    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenInvalid, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Create a forbidden error carrying a reason code.
    pub fn forbidden(reason: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message).with_reason(reason)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Returns `true` if this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Build the structured failure body for this error.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.kind.code().to_string(),
            reason: self.reason.map(String::from),
            message: self.message.clone(),
        }
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            reason: self.reason,
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::with_source(
                ErrorKind::ServiceUnavailable,
                "Database pool timed out",
                err,
            ),
            _ => Self::with_source(ErrorKind::Database, "Database operation failed", err),
        }
    }
}
