//! Cache key builders.
//!
//! Keys are unprefixed here; the Redis provider prepends the configured
//! namespace (`gatekeeper:` by default).

use uuid::Uuid;

/// Cache key for the materialized permission set of an identity.
pub fn permissions(user_id: Uuid) -> String {
    format!("permissions:{user_id}")
}
