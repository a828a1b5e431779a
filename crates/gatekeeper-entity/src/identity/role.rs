//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles available to an identity.
///
/// `SuperAdmin` is special: it is implicitly granted every permission in
/// the catalog and never holds explicit assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Holds every permission by role.
    SuperAdmin,
    /// Tenant administrator.
    Admin,
    /// Manages day-to-day records.
    Manager,
    /// Regular operator.
    User,
    /// Read-only.
    Viewer,
}

impl UserRole {
    /// Check if this role bypasses explicit permission assignments.
    pub fn is_superadmin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// Return the role as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::User => "USER",
            Self::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = gatekeeper_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SUPER_ADMIN" | "SUPERADMIN" => Ok(Self::SuperAdmin),
            "ADMIN" => Ok(Self::Admin),
            "MANAGER" => Ok(Self::Manager),
            "USER" => Ok(Self::User),
            "VIEWER" => Ok(Self::Viewer),
            _ => Err(gatekeeper_core::AppError::validation(format!(
                "Invalid user role: '{s}'. Expected one of: SUPER_ADMIN, ADMIN, MANAGER, USER, VIEWER"
            ))),
        }
    }
}
