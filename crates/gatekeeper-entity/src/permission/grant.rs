//! Permission catalog entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use gatekeeper_core::AppError;

/// A `(module, action, resource)` capability triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionTuple {
    /// Functional area, e.g. `inventory`.
    pub module: String,
    /// Verb, e.g. `read`.
    pub action: String,
    /// Object, e.g. `products`.
    pub resource: String,
}

impl PermissionTuple {
    /// Build a tuple from its three parts.
    pub fn new(
        module: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            action: action.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for PermissionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module, self.action, self.resource)
    }
}

impl FromStr for PermissionTuple {
    type Err = AppError;

    /// Parses `module:action:resource`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [m, a, r] if !m.is_empty() && !a.is_empty() && !r.is_empty() => {
                Ok(Self::new(*m, *a, *r))
            }
            _ => Err(AppError::validation(format!(
                "Invalid permission '{s}'. Expected module:action:resource"
            ))),
        }
    }
}

/// A catalog entry, unique by its triple.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionGrant {
    /// Unique grant identifier.
    pub id: Uuid,
    /// Functional area.
    pub module: String,
    /// Verb.
    pub action: String,
    /// Object.
    pub resource: String,
    /// Human description. The only field that may change once referenced.
    pub description: String,
    /// When the grant was created.
    pub created_at: DateTime<Utc>,
}

impl PermissionGrant {
    /// The identifying triple.
    pub fn tuple(&self) -> PermissionTuple {
        PermissionTuple::new(&self.module, &self.action, &self.resource)
    }

    /// Check whether this grant is identified by `tuple`.
    pub fn matches(&self, tuple: &PermissionTuple) -> bool {
        self.module == tuple.module && self.action == tuple.action && self.resource == tuple.resource
    }
}
