//! In-memory credential store backed by `dashmap`.
//!
//! Suitable for tests and single-node deployments. Atomicity comes from
//! DashMap shard locks: every mutation that touches an identity holds that
//! identity's entry for the duration of the change. Lock order is always
//! identities → grants → assignments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;
use uuid::Uuid;

use gatekeeper_core::error::{AppError, reason};
use gatekeeper_core::result::AppResult;
use gatekeeper_entity::{
    Identity, NewIdentity, PermissionGrant, PermissionTuple, Tenant, UserPermissionAssignment,
    UserRole, UserStatus,
};

use crate::store::{IdentityStore, IdentityWithTenant, PermissionStore, TenantStore};

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    identities: DashMap<Uuid, Identity>,
    /// Normalized email → identity ID. Enforces uniqueness.
    emails: DashMap<String, Uuid>,
    tenants: DashMap<Uuid, Tenant>,
    grants: DashMap<Uuid, PermissionGrant>,
    /// Tuple → grant ID. Enforces catalog uniqueness.
    grant_index: DashMap<PermissionTuple, Uuid>,
    assignments: DashMap<(Uuid, Uuid), UserPermissionAssignment>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tenant(&self, identity: Identity) -> IdentityWithTenant {
        let tenant_active = self
            .tenants
            .get(&identity.tenant_id)
            .map(|t| t.is_active)
            .unwrap_or(false);
        IdentityWithTenant {
            identity,
            tenant_active,
        }
    }

    fn not_found(id: Uuid) -> AppError {
        AppError::not_found(format!("Identity {id} not found"))
    }

    /// Runs `f` with exclusive access to the identity, stamping `updated_at`.
    fn mutate<T>(&self, id: Uuid, f: impl FnOnce(&mut Identity) -> T) -> AppResult<T> {
        let mut entry = self.identities.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        let out = f(&mut entry);
        entry.updated_at = Utc::now();
        Ok(out)
    }
}

#[async_trait]
impl IdentityStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        let id = match self.emails.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.identities.get(&id).map(|i| i.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Identity>> {
        Ok(self.identities.get(&id).map(|i| i.clone()))
    }

    async fn find_account_by_email(&self, email: &str) -> AppResult<Option<IdentityWithTenant>> {
        Ok(self
            .find_by_email(email)
            .await?
            .map(|identity| self.with_tenant(identity)))
    }

    async fn find_account(&self, id: Uuid) -> AppResult<Option<IdentityWithTenant>> {
        Ok(self
            .find_by_id(id)
            .await?
            .map(|identity| self.with_tenant(identity)))
    }

    async fn create(&self, new: NewIdentity) -> AppResult<Identity> {
        if !self.tenants.contains_key(&new.tenant_id) {
            return Err(AppError::not_found(format!(
                "Tenant {} not found",
                new.tenant_id
            )));
        }

        match self.emails.entry(new.email.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict("Email is already registered")),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let identity = Identity {
                    id: Uuid::now_v7(),
                    email: new.email,
                    password_hash: new.password_hash,
                    name: new.name,
                    role: new.role,
                    status: UserStatus::Active,
                    status_reason: None,
                    tenant_id: new.tenant_id,
                    refresh_token_hash: None,
                    permissions_version: 0,
                    last_login_at: None,
                    password_changed_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.identities.insert(identity.id, identity.clone());
                slot.insert(identity.id);
                Ok(identity)
            }
        }
    }

    async fn record_login(
        &self,
        id: Uuid,
        expected_password_hash: &str,
        refresh_hash: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let Some(mut identity) = self.identities.get_mut(&id) else {
            return Ok(false);
        };
        if !identity.status.is_active() || identity.password_hash != expected_password_hash {
            return Ok(false);
        }
        identity.refresh_token_hash = Some(refresh_hash.to_string());
        identity.last_login_at = Some(at);
        identity.updated_at = Utc::now();
        Ok(true)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> AppResult<bool> {
        self.mutate(id, |identity| {
            if identity.refresh_token_hash.as_deref() != expected {
                return false;
            }
            identity.refresh_token_hash = new.map(String::from);
            true
        })
    }

    async fn clear_refresh_token(&self, id: Uuid) -> AppResult<()> {
        if let Some(mut identity) = self.identities.get_mut(&id) {
            identity.refresh_token_hash = None;
            identity.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.mutate(id, |identity| {
            identity.password_hash = password_hash.to_string();
            identity.password_changed_at = Some(at);
            identity.refresh_token_hash = None;
        })
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: UserStatus,
        reason: Option<&str>,
    ) -> AppResult<()> {
        self.mutate(id, |identity| {
            identity.status = status;
            identity.status_reason = reason.map(String::from);
            if !status.is_active() {
                identity.refresh_token_hash = None;
            }
        })
    }

    async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<()> {
        self.mutate(id, |identity| {
            identity.role = role;
            identity.permissions_version += 1;
            if role.is_superadmin() {
                self.assignments.retain(|(user_id, _), _| *user_id != id);
            }
        })
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        match self.identities.remove(&id) {
            Some((_, identity)) => {
                self.emails.remove(&identity.email);
                self.assignments.retain(|(user_id, _), _| *user_id != id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn superadmin_exists(&self) -> AppResult<bool> {
        Ok(self.identities.iter().any(|i| i.role.is_superadmin()))
    }
}

#[async_trait]
impl TenantStore for MemoryCredentialStore {
    async fn find_tenant(&self, id: Uuid) -> AppResult<Option<Tenant>> {
        Ok(self.tenants.get(&id).map(|t| t.clone()))
    }

    async fn find_tenant_by_name(&self, name: &str) -> AppResult<Option<Tenant>> {
        Ok(self
            .tenants
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.clone()))
    }

    async fn create_tenant(&self, name: &str) -> AppResult<Tenant> {
        let tenant = Tenant {
            id: Uuid::now_v7(),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn set_tenant_active(&self, id: Uuid, active: bool) -> AppResult<()> {
        let mut tenant = self
            .tenants
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Tenant {id} not found")))?;
        tenant.is_active = active;
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryCredentialStore {
    async fn list_grants(&self) -> AppResult<Vec<PermissionGrant>> {
        let mut grants: Vec<PermissionGrant> = self.grants.iter().map(|g| g.clone()).collect();
        grants.sort_by_key(|g| g.tuple());
        Ok(grants)
    }

    async fn find_grant(&self, tuple: &PermissionTuple) -> AppResult<Option<PermissionGrant>> {
        let id = match self.grant_index.get(tuple) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.grants.get(&id).map(|g| g.clone()))
    }

    async fn create_grant(
        &self,
        tuple: &PermissionTuple,
        description: &str,
    ) -> AppResult<PermissionGrant> {
        let slot = match self.grant_index.entry(tuple.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::conflict(format!("Permission {tuple} already exists")));
            }
            Entry::Vacant(slot) => slot,
        };
        let grant = PermissionGrant {
            id: Uuid::now_v7(),
            module: tuple.module.clone(),
            action: tuple.action.clone(),
            resource: tuple.resource.clone(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.grants.insert(grant.id, grant.clone());
        slot.insert(grant.id);
        Ok(grant)
    }

    async fn update_grant_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> AppResult<PermissionGrant> {
        let mut grant = self
            .grants
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Permission {id} not found")))?;
        grant.description = description.to_string();
        Ok(grant.clone())
    }

    async fn delete_grant(&self, id: Uuid) -> AppResult<bool> {
        match self.grants.entry(id) {
            Entry::Vacant(_) => Ok(false),
            Entry::Occupied(entry) => {
                if self.assignments.iter().any(|a| a.permission_id == id) {
                    return Err(AppError::conflict(
                        "Permission is referenced by assignments and cannot be deleted",
                    ));
                }
                let grant = entry.remove();
                self.grant_index.remove(&grant.tuple());
                Ok(true)
            }
        }
    }

    async fn granted_permissions(&self, user_id: Uuid) -> AppResult<Vec<PermissionGrant>> {
        let ids: Vec<Uuid> = self
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.granted)
            .map(|a| a.permission_id)
            .collect();
        let mut grants: Vec<PermissionGrant> = ids
            .iter()
            .filter_map(|id| self.grants.get(id).map(|g| g.clone()))
            .collect();
        grants.sort_by_key(|g| g.tuple());
        Ok(grants)
    }

    async fn list_assignments(&self, user_id: Uuid) -> AppResult<Vec<UserPermissionAssignment>> {
        let mut rows: Vec<UserPermissionAssignment> = self
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.clone())
            .collect();
        rows.sort_by_key(|a| a.granted_at);
        Ok(rows)
    }

    async fn grant_assignment(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        granted_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<UserPermissionAssignment> {
        let mut identity = self
            .identities
            .get_mut(&user_id)
            .ok_or_else(|| Self::not_found(user_id))?;

        if identity.role.is_superadmin() {
            return Err(AppError::forbidden(
                reason::SUPERADMIN_PROTECTED,
                "Superadmin holds every permission implicitly and cannot receive assignments",
            ));
        }
        // Held until the assignment is written so the grant cannot be
        // deleted underneath it.
        let _grant = self.grants.get(&permission_id).ok_or_else(|| {
            AppError::not_found(format!("Permission {permission_id} not found"))
        })?;

        let row = match self.assignments.entry((user_id, permission_id)) {
            Entry::Occupied(mut existing) => {
                if existing.get().granted {
                    return Err(AppError::conflict("Permission is already granted"));
                }
                let row = existing.get_mut();
                row.granted = true;
                row.granted_at = at;
                row.granted_by = granted_by;
                row.clone()
            }
            Entry::Vacant(slot) => slot
                .insert(UserPermissionAssignment {
                    user_id,
                    permission_id,
                    granted: true,
                    granted_at: at,
                    granted_by,
                })
                .clone(),
        };

        identity.permissions_version += 1;
        identity.updated_at = at;
        debug!(user_id = %user_id, version = identity.permissions_version, "Assignment granted");
        Ok(row)
    }

    async fn revoke_assignment(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        revoked_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut identity = self
            .identities
            .get_mut(&user_id)
            .ok_or_else(|| Self::not_found(user_id))?;

        let revoked = match self.assignments.get_mut(&(user_id, permission_id)) {
            Some(mut row) if row.granted => {
                row.granted = false;
                row.granted_at = at;
                row.granted_by = revoked_by;
                true
            }
            _ => false,
        };

        if revoked {
            identity.permissions_version += 1;
            identity.updated_at = at;
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatekeeper_core::ErrorKind;

    use super::*;

    async fn seeded() -> (MemoryCredentialStore, Identity) {
        let store = MemoryCredentialStore::new();
        let tenant = store.create_tenant("Acme").await.unwrap();
        let identity = store
            .create(NewIdentity {
                email: "ann@acme.test".into(),
                password_hash: "hash".into(),
                name: "Ann".into(),
                role: UserRole::Viewer,
                tenant_id: tenant.id,
            })
            .await
            .unwrap();
        (store, identity)
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (store, identity) = seeded().await;
        let err = store
            .create(NewIdentity {
                email: "ann@acme.test".into(),
                password_hash: "hash".into(),
                name: "Other".into(),
                role: UserRole::Viewer,
                tenant_id: identity.tenant_id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_swap_refresh_token_compare_and_set() {
        let (store, identity) = seeded().await;
        assert!(store.record_login(identity.id, "hash", "r1", Utc::now()).await.unwrap());

        assert!(!store.swap_refresh_token(identity.id, Some("r0"), Some("r2")).await.unwrap());
        assert!(store.swap_refresh_token(identity.id, Some("r1"), Some("r2")).await.unwrap());
        assert!(!store.swap_refresh_token(identity.id, Some("r1"), Some("r3")).await.unwrap());

        let stored = store.find_by_id(identity.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_concurrent_swaps_have_one_winner() {
        let (store, identity) = seeded().await;
        let store = Arc::new(store);
        assert!(store.record_login(identity.id, "hash", "r1", Utc::now()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let new = format!("r2-{i}");
            handles.push(tokio::spawn(async move {
                store
                    .swap_refresh_token(identity.id, Some("r1"), Some(&new))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_suspension_clears_refresh_token() {
        let (store, identity) = seeded().await;
        assert!(store.record_login(identity.id, "hash", "r1", Utc::now()).await.unwrap());
        store
            .update_status(identity.id, UserStatus::Suspended, Some("fraud review"))
            .await
            .unwrap();

        let stored = store.find_by_id(identity.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());
        assert_eq!(stored.status_reason.as_deref(), Some("fraud review"));
    }

    #[tokio::test]
    async fn test_record_login_requires_active_status_and_current_hash() {
        let (store, identity) = seeded().await;

        assert!(!store.record_login(identity.id, "stale", "r1", Utc::now()).await.unwrap());
        assert!(!store.record_login(Uuid::new_v4(), "hash", "r1", Utc::now()).await.unwrap());

        store
            .update_status(identity.id, UserStatus::Suspended, None)
            .await
            .unwrap();
        assert!(!store.record_login(identity.id, "hash", "r1", Utc::now()).await.unwrap());

        let stored = store.find_by_id(identity.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());
        assert!(stored.last_login_at.is_none());
    }

    #[tokio::test]
    async fn test_assignment_bumps_version_and_blocks_grant_delete() {
        let (store, identity) = seeded().await;
        let grant = store
            .create_grant(&PermissionTuple::new("sales", "read", "orders"), "Read orders")
            .await
            .unwrap();

        store
            .grant_assignment(identity.id, grant.id, Uuid::nil(), Utc::now())
            .await
            .unwrap();
        let again = store
            .grant_assignment(identity.id, grant.id, Uuid::nil(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(again.kind, ErrorKind::Conflict);

        let stored = store.find_by_id(identity.id).await.unwrap().unwrap();
        assert_eq!(stored.permissions_version, 1);

        let err = store.delete_grant(grant.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        assert!(
            store
                .revoke_assignment(identity.id, grant.id, Uuid::nil(), Utc::now())
                .await
                .unwrap()
        );
        assert!(store.granted_permissions(identity.id).await.unwrap().is_empty());
        assert_eq!(store.list_assignments(identity.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_promotion_to_superadmin_drops_assignments() {
        let (store, identity) = seeded().await;
        let grant = store
            .create_grant(&PermissionTuple::new("sales", "read", "orders"), "")
            .await
            .unwrap();
        store
            .grant_assignment(identity.id, grant.id, Uuid::nil(), Utc::now())
            .await
            .unwrap();

        store.update_role(identity.id, UserRole::SuperAdmin).await.unwrap();
        assert!(store.list_assignments(identity.id).await.unwrap().is_empty());

        let err = store
            .grant_assignment(identity.id, grant.id, Uuid::nil(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_account_reports_tenant_flag() {
        let (store, identity) = seeded().await;
        assert!(store.find_account(identity.id).await.unwrap().unwrap().tenant_active);

        store.set_tenant_active(identity.tenant_id, false).await.unwrap();
        let account = store.find_account_by_email("ann@acme.test").await.unwrap().unwrap();
        assert!(!account.tenant_active);
    }
}
