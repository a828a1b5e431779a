//! Identity repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use gatekeeper_core::error::{AppError, ErrorKind};
use gatekeeper_core::result::AppResult;
use gatekeeper_entity::{Identity, NewIdentity, UserRole, UserStatus};

use super::{db_err, map_write_err};
use crate::store::{IdentityStore, IdentityWithTenant};

const ACCOUNT_SELECT: &str =
    "SELECT u.*, t.is_active AS tenant_active FROM users u JOIN tenants t ON t.id = u.tenant_id";

/// Repository for identity persistence.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new identity repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run an update that must hit exactly one row.
    async fn update_one(
        &self,
        id: Uuid,
        query: Query<'_, Postgres, PgArguments>,
        context: &'static str,
    ) -> AppResult<()> {
        let result = query.execute(&self.pool).await.map_err(db_err(context))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Identity {id} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        sqlx::query_as::<_, Identity>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find identity by email"))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Identity>> {
        sqlx::query_as::<_, Identity>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find identity by id"))
    }

    async fn find_account_by_email(&self, email: &str) -> AppResult<Option<IdentityWithTenant>> {
        sqlx::query_as::<_, IdentityWithTenant>(&format!("{ACCOUNT_SELECT} WHERE u.email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to load account by email"))
    }

    async fn find_account(&self, id: Uuid) -> AppResult<Option<IdentityWithTenant>> {
        sqlx::query_as::<_, IdentityWithTenant>(&format!("{ACCOUNT_SELECT} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to load account"))
    }

    async fn create(&self, new: NewIdentity) -> AppResult<Identity> {
        sqlx::query_as::<_, Identity>(
            r#"INSERT INTO users (id, email, password_hash, name, role, status, tenant_id)
            VALUES ($1, $2, $3, $4, $5, 'ACTIVE', $6)
            RETURNING *"#,
        )
        .bind(Uuid::now_v7())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(new.role)
        .bind(new.tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let missing_tenant =
                matches!(&e, sqlx::Error::Database(db) if db.is_foreign_key_violation());
            if missing_tenant {
                AppError::not_found(format!("Tenant {} not found", new.tenant_id))
            } else {
                map_write_err(e, "Email is already registered", "Failed to create identity")
            }
        })
    }

    async fn record_login(
        &self,
        id: Uuid,
        expected_password_hash: &str,
        refresh_hash: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"UPDATE users SET refresh_token_hash = $3, last_login_at = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'ACTIVE' AND password_hash = $2"#,
        )
        .bind(id)
        .bind(expected_password_hash)
        .bind(refresh_hash)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to record login"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"UPDATE users SET refresh_token_hash = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token_hash IS NOT DISTINCT FROM $2"#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to rotate refresh token"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_refresh_token(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to clear refresh token"))?;
        Ok(())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let query = sqlx::query(
            r#"UPDATE users
            SET password_hash = $2, password_changed_at = $3, refresh_token_hash = NULL, updated_at = NOW()
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(at);
        self.update_one(id, query, "Failed to update password").await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: UserStatus,
        reason: Option<&str>,
    ) -> AppResult<()> {
        let query = sqlx::query(
            r#"UPDATE users
            SET status = $2,
                status_reason = $3,
                refresh_token_hash = CASE WHEN $2 = 'ACTIVE'::user_status THEN refresh_token_hash ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(status)
        .bind(reason);
        self.update_one(id, query, "Failed to update status").await
    }

    async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let result = sqlx::query(
            r#"UPDATE users
            SET role = $2, permissions_version = permissions_version + 1, updated_at = NOW()
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(role)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to update role"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Identity {id} not found")));
        }

        if role.is_superadmin() {
            sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err("Failed to drop assignments"))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit role change", e))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete identity"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn superadmin_exists(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'SUPER_ADMIN')")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to check for superadmin"))
    }
}
