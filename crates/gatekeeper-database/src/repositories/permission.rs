//! Permission catalog and assignment repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use gatekeeper_core::error::{AppError, ErrorKind, reason};
use gatekeeper_core::result::AppResult;
use gatekeeper_entity::{PermissionGrant, PermissionTuple, UserPermissionAssignment, UserRole};

use super::{db_err, map_write_err};
use crate::store::PermissionStore;

/// Repository for `permissions` and `user_permissions`.
#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    /// Create a new permission repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PermissionRepository {
    async fn list_grants(&self) -> AppResult<Vec<PermissionGrant>> {
        sqlx::query_as::<_, PermissionGrant>(
            "SELECT * FROM permissions ORDER BY module, action, resource",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list permissions"))
    }

    async fn find_grant(&self, tuple: &PermissionTuple) -> AppResult<Option<PermissionGrant>> {
        sqlx::query_as::<_, PermissionGrant>(
            "SELECT * FROM permissions WHERE module = $1 AND action = $2 AND resource = $3",
        )
        .bind(&tuple.module)
        .bind(&tuple.action)
        .bind(&tuple.resource)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to find permission"))
    }

    async fn create_grant(
        &self,
        tuple: &PermissionTuple,
        description: &str,
    ) -> AppResult<PermissionGrant> {
        sqlx::query_as::<_, PermissionGrant>(
            r#"INSERT INTO permissions (id, module, action, resource, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *"#,
        )
        .bind(Uuid::now_v7())
        .bind(&tuple.module)
        .bind(&tuple.action)
        .bind(&tuple.resource)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_err(
                e,
                &format!("Permission {tuple} already exists"),
                "Failed to create permission",
            )
        })
    }

    async fn update_grant_description(
        &self,
        id: Uuid,
        description: &str,
    ) -> AppResult<PermissionGrant> {
        sqlx::query_as::<_, PermissionGrant>(
            "UPDATE permissions SET description = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to update permission"))?
        .ok_or_else(|| AppError::not_found(format!("Permission {id} not found")))
    }

    async fn delete_grant(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(
                AppError::conflict("Permission is referenced by assignments and cannot be deleted"),
            ),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Database,
                "Failed to delete permission",
                e,
            )),
        }
    }

    async fn granted_permissions(&self, user_id: Uuid) -> AppResult<Vec<PermissionGrant>> {
        sqlx::query_as::<_, PermissionGrant>(
            r#"SELECT p.* FROM permissions p
            JOIN user_permissions up ON up.permission_id = p.id
            WHERE up.user_id = $1 AND up.granted
            ORDER BY p.module, p.action, p.resource"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load granted permissions"))
    }

    async fn list_assignments(&self, user_id: Uuid) -> AppResult<Vec<UserPermissionAssignment>> {
        sqlx::query_as::<_, UserPermissionAssignment>(
            "SELECT * FROM user_permissions WHERE user_id = $1 ORDER BY granted_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list assignments"))
    }

    async fn grant_assignment(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        granted_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<UserPermissionAssignment> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let role: Option<UserRole> =
            sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err("Failed to lock identity"))?;

        match role {
            None => return Err(AppError::not_found(format!("Identity {user_id} not found"))),
            Some(role) if role.is_superadmin() => {
                return Err(AppError::forbidden(
                    reason::SUPERADMIN_PROTECTED,
                    "Superadmin holds every permission implicitly and cannot receive assignments",
                ));
            }
            Some(_) => {}
        }

        let row = sqlx::query_as::<_, UserPermissionAssignment>(
            r#"INSERT INTO user_permissions (user_id, permission_id, granted, granted_at, granted_by)
            VALUES ($1, $2, TRUE, $3, $4)
            ON CONFLICT (user_id, permission_id) DO UPDATE
                SET granted = TRUE, granted_at = EXCLUDED.granted_at, granted_by = EXCLUDED.granted_by
                WHERE user_permissions.granted = FALSE
            RETURNING *"#,
        )
        .bind(user_id)
        .bind(permission_id)
        .bind(at)
        .bind(granted_by)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            let missing_grant =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if missing_grant {
                AppError::not_found(format!("Permission {permission_id} not found"))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to grant permission", e)
            }
        })?
        .ok_or_else(|| AppError::conflict("Permission is already granted"))?;

        sqlx::query(
            "UPDATE users SET permissions_version = permissions_version + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to bump permissions version"))?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit assignment"))?;

        debug!(user_id = %user_id, permission_id = %permission_id, "Assignment granted");
        Ok(row)
    }

    async fn revoke_assignment(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        revoked_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let result = sqlx::query(
            r#"UPDATE user_permissions
            SET granted = FALSE, granted_at = $3, granted_by = $4
            WHERE user_id = $1 AND permission_id = $2 AND granted"#,
        )
        .bind(user_id)
        .bind(permission_id)
        .bind(at)
        .bind(revoked_by)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to revoke permission"))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE users SET permissions_version = permissions_version + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to bump permissions version"))?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit revocation"))?;
        Ok(true)
    }
}
