//! Account and tenant status gates shared by every entry point.

use gatekeeper_core::error::{AppError, reason};
use gatekeeper_core::result::AppResult;
use gatekeeper_database::IdentityWithTenant;
use gatekeeper_entity::UserStatus;

/// Reject accounts that are not ACTIVE or whose tenant is inactive.
///
/// Each failure carries its own reason code.
pub fn ensure_usable(account: &IdentityWithTenant) -> AppResult<()> {
    match account.identity.status {
        UserStatus::Active => {}
        UserStatus::Inactive => {
            return Err(AppError::forbidden(
                reason::ACCOUNT_INACTIVE,
                "Account is inactive",
            ));
        }
        UserStatus::Suspended => {
            return Err(AppError::forbidden(
                reason::ACCOUNT_SUSPENDED,
                "Account is suspended",
            ));
        }
    }

    if !account.tenant_active {
        return Err(AppError::forbidden(
            reason::TENANT_INACTIVE,
            "Tenant is inactive",
        ));
    }

    Ok(())
}

/// Whether the account would pass [`ensure_usable`].
pub fn is_usable(account: &IdentityWithTenant) -> bool {
    account.identity.status.is_active() && account.tenant_active
}
