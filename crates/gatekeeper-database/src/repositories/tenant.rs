//! Tenant repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use gatekeeper_core::error::AppError;
use gatekeeper_core::result::AppResult;
use gatekeeper_entity::Tenant;

use super::db_err;
use crate::store::TenantStore;

/// Repository for tenants.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    /// Create a new tenant repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for TenantRepository {
    async fn find_tenant(&self, id: Uuid) -> AppResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find tenant"))
    }

    async fn find_tenant_by_name(&self, name: &str) -> AppResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE name = $1 ORDER BY created_at LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find tenant by name"))
    }

    async fn create_tenant(&self, name: &str) -> AppResult<Tenant> {
        sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, name, is_active) VALUES ($1, $2, TRUE) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to create tenant"))
    }

    async fn set_tenant_active(&self, id: Uuid, active: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE tenants SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to update tenant"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Tenant {id} not found")));
        }
        Ok(())
    }
}
