//! Administrative identity management: create, status, role, delete, tenants.

use std::time::Duration;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use gatekeeper_core::config::{AuthConfig, BootstrapConfig};
use gatekeeper_core::deadline::bounded;
use gatekeeper_core::error::{AppError, reason};
use gatekeeper_core::result::AppResult;
use gatekeeper_database::CredentialStores;
use gatekeeper_entity::{Identity, IdentityProfile, NewIdentity, Tenant, UserRole, UserStatus};

use crate::guard::IdentityContext;
use crate::password::validator::{validated_email, validated_name};
use crate::password::{PasswordHasher, PasswordValidator};
use crate::permission::PermissionResolver;

/// Request to create an identity on someone's behalf.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityRequest {
    /// Email; normalized before use.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Role to assign.
    pub role: UserRole,
    /// Owning tenant.
    pub tenant_id: Uuid,
}

/// Handles administrative identity and tenant operations.
///
/// Authorization of the actor (which permission tuple lets them call
/// these) is the caller's concern; the rules enforced here are the ones
/// that hold no matter who asks.
#[derive(Debug, Clone)]
pub struct AccountAdmin {
    stores: CredentialStores,
    hasher: PasswordHasher,
    validator: PasswordValidator,
    resolver: PermissionResolver,
    store_timeout: Duration,
}

impl AccountAdmin {
    /// Creates a new account admin service.
    pub fn new(
        stores: CredentialStores,
        hasher: PasswordHasher,
        resolver: PermissionResolver,
        config: &AuthConfig,
    ) -> Self {
        Self {
            stores,
            hasher,
            validator: PasswordValidator::new(config),
            resolver,
            store_timeout: config.store_timeout(),
        }
    }

    /// Creates an ACTIVE identity. Only a superadmin may create another.
    pub async fn create_identity(
        &self,
        actor: &IdentityContext,
        req: CreateIdentityRequest,
    ) -> AppResult<IdentityProfile> {
        if req.role.is_superadmin() && !actor.is_superadmin() {
            return Err(AppError::forbidden(
                reason::ROLE_NOT_ALLOWED,
                "Only a superadmin can create a superadmin",
            ));
        }

        let identity = self.create_unchecked(req).await?;
        info!(
            user_id = %identity.id,
            actor = %actor.user_id,
            role = %identity.role,
            "Identity created by admin"
        );
        Ok(identity.profile())
    }

    async fn create_unchecked(&self, req: CreateIdentityRequest) -> AppResult<Identity> {
        let email = validated_email(&req.email)?;
        let name = validated_name(&req.name)?;
        self.validator.validate(&req.password)?;

        let tenant = self.tenant(req.tenant_id).await?;
        if !tenant.is_active {
            return Err(AppError::forbidden(
                reason::TENANT_INACTIVE,
                "Tenant is inactive",
            ));
        }

        let password_hash = self.hasher.hash(&req.password).await?;
        bounded(
            self.store_timeout,
            "identity.create",
            self.stores.identities.create(NewIdentity {
                email,
                password_hash,
                name,
                role: req.role,
                tenant_id: tenant.id,
            }),
        )
        .await
    }

    /// Changes an identity's status.
    ///
    /// Suspension needs a non-empty reason. Leaving ACTIVE clears the
    /// stored refresh token in the same store operation.
    pub async fn change_status(
        &self,
        actor: &IdentityContext,
        user_id: Uuid,
        status: UserStatus,
        status_reason: Option<&str>,
    ) -> AppResult<()> {
        let status_reason = status_reason.map(str::trim).filter(|r| !r.is_empty());
        if status == UserStatus::Suspended && status_reason.is_none() {
            return Err(AppError::validation("A reason is required to suspend an account"));
        }

        self.identity(user_id).await?;
        bounded(
            self.store_timeout,
            "identity.update_status",
            self.stores
                .identities
                .update_status(user_id, status, status_reason),
        )
        .await?;
        self.resolver.invalidate(user_id).await;

        info!(
            user_id = %user_id,
            actor = %actor.user_id,
            status = %status,
            reason = status_reason.unwrap_or(""),
            "Status changed"
        );
        Ok(())
    }

    /// Changes an identity's role. Promotion to superadmin is reserved to
    /// superadmins and drops every explicit assignment.
    pub async fn change_role(
        &self,
        actor: &IdentityContext,
        user_id: Uuid,
        role: UserRole,
    ) -> AppResult<()> {
        if role.is_superadmin() && !actor.is_superadmin() {
            return Err(AppError::forbidden(
                reason::ROLE_NOT_ALLOWED,
                "Only a superadmin can grant the superadmin role",
            ));
        }

        let current = self.identity(user_id).await?;
        if current.is_superadmin() && !actor.is_superadmin() {
            return Err(AppError::forbidden(
                reason::SUPERADMIN_PROTECTED,
                "Cannot change a superadmin's role",
            ));
        }

        bounded(
            self.store_timeout,
            "identity.update_role",
            self.stores.identities.update_role(user_id, role),
        )
        .await?;
        self.resolver.invalidate(user_id).await;

        info!(
            user_id = %user_id,
            actor = %actor.user_id,
            from = %current.role,
            to = %role,
            "Role changed"
        );
        Ok(())
    }

    /// Deletes an identity. Self-deletion and deleting a superadmin are refused.
    pub async fn delete_identity(&self, actor: &IdentityContext, user_id: Uuid) -> AppResult<()> {
        if actor.user_id == user_id {
            return Err(AppError::forbidden(
                reason::SELF_DELETION,
                "Cannot delete your own account",
            ));
        }

        let target = self.identity(user_id).await?;
        if target.is_superadmin() {
            return Err(AppError::forbidden(
                reason::SUPERADMIN_PROTECTED,
                "Cannot delete a superadmin",
            ));
        }

        let deleted = bounded(
            self.store_timeout,
            "identity.delete",
            self.stores.identities.delete(user_id),
        )
        .await?;
        if !deleted {
            return Err(AppError::not_found(format!("Identity {user_id} not found")));
        }
        self.resolver.invalidate(user_id).await;

        info!(user_id = %user_id, actor = %actor.user_id, "Identity deleted");
        Ok(())
    }

    /// Creates an active tenant.
    pub async fn create_tenant(&self, name: &str) -> AppResult<Tenant> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Tenant name must not be empty"));
        }
        let tenant = bounded(
            self.store_timeout,
            "tenant.create",
            self.stores.tenants.create_tenant(name),
        )
        .await?;
        info!(tenant_id = %tenant.id, "Tenant created");
        Ok(tenant)
    }

    /// Activates or deactivates a tenant. Takes effect on the members'
    /// next login, refresh, or permission check.
    pub async fn set_tenant_active(&self, tenant_id: Uuid, active: bool) -> AppResult<()> {
        bounded(
            self.store_timeout,
            "tenant.set_active",
            self.stores.tenants.set_tenant_active(tenant_id, active),
        )
        .await?;
        info!(tenant_id = %tenant_id, active, "Tenant status changed");
        Ok(())
    }

    /// Ensure the configured tenant and superadmin exist. Idempotent.
    pub async fn bootstrap(&self, config: &BootstrapConfig) -> AppResult<()> {
        let tenant = match bounded(
            self.store_timeout,
            "tenant.find_by_name",
            self.stores.tenants.find_tenant_by_name(&config.tenant_name),
        )
        .await?
        {
            Some(tenant) => tenant,
            None => self.create_tenant(&config.tenant_name).await?,
        };

        let exists = bounded(
            self.store_timeout,
            "identity.superadmin_exists",
            self.stores.identities.superadmin_exists(),
        )
        .await?;
        if exists {
            info!("Superadmin already present, skipping bootstrap");
            return Ok(());
        }

        let identity = self
            .create_unchecked(CreateIdentityRequest {
                email: config.superadmin_email.clone(),
                password: config.superadmin_password.clone(),
                name: config.superadmin_name.clone(),
                role: UserRole::SuperAdmin,
                tenant_id: tenant.id,
            })
            .await?;
        info!(user_id = %identity.id, tenant_id = %tenant.id, "Bootstrap superadmin created");
        Ok(())
    }

    async fn identity(&self, user_id: Uuid) -> AppResult<Identity> {
        bounded(
            self.store_timeout,
            "identity.find_by_id",
            self.stores.identities.find_by_id(user_id),
        )
        .await?
        .ok_or_else(|| AppError::not_found(format!("Identity {user_id} not found")))
    }

    async fn tenant(&self, tenant_id: Uuid) -> AppResult<Tenant> {
        bounded(
            self.store_timeout,
            "tenant.find",
            self.stores.tenants.find_tenant(tenant_id),
        )
        .await?
        .ok_or_else(|| AppError::not_found(format!("Tenant {tenant_id} not found")))
    }
}
