//! Derived, cacheable effective permission sets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grant::{PermissionGrant, PermissionTuple};

/// Where a permission in an effective set comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSource {
    /// Implied by the superadmin role.
    RoleDerived,
    /// An assignment with `granted = true`.
    ExplicitGrant,
}

/// A single resolved permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    /// The capability.
    pub tuple: PermissionTuple,
    /// How it was obtained.
    pub source: PermissionSource,
}

/// Everything an identity may do, as of `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissionSet {
    /// The identity this set belongs to.
    pub user_id: Uuid,
    /// `permissions_version` of the identity when the set was computed.
    pub version: i64,
    /// Resolved permissions, sorted by tuple.
    pub permissions: Vec<EffectivePermission>,
}

impl EffectivePermissionSet {
    /// Build a set from catalog grants, all marked with `source`.
    pub fn from_grants(
        user_id: Uuid,
        version: i64,
        grants: &[PermissionGrant],
        source: PermissionSource,
    ) -> Self {
        let mut permissions: Vec<EffectivePermission> = grants
            .iter()
            .map(|g| EffectivePermission {
                tuple: g.tuple(),
                source,
            })
            .collect();
        permissions.sort_by(|a, b| a.tuple.cmp(&b.tuple));
        permissions.dedup_by(|a, b| a.tuple == b.tuple);
        Self {
            user_id,
            version,
            permissions,
        }
    }

    /// Exact tuple membership.
    pub fn contains(&self, tuple: &PermissionTuple) -> bool {
        self.permissions
            .binary_search_by(|p| p.tuple.cmp(tuple))
            .is_ok()
    }

    /// True if at least one of `tuples` is held.
    pub fn contains_any(&self, tuples: &[PermissionTuple]) -> bool {
        tuples.iter().any(|t| self.contains(t))
    }

    /// True if every one of `tuples` is held. Vacuously true when empty.
    pub fn contains_all(&self, tuples: &[PermissionTuple]) -> bool {
        tuples.iter().all(|t| self.contains(t))
    }

    /// The tuples alone.
    pub fn tuples(&self) -> impl Iterator<Item = &PermissionTuple> {
        self.permissions.iter().map(|p| &p.tuple)
    }

    /// Number of permissions in the set.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}
