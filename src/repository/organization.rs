//! Organizations: the tenant registry in the core database.

use crate::error::{is_unique_violation, AppError};
use crate::models::Organization;
use sqlx::PgPool;
use uuid::Uuid;

const COLUMNS: &str = "id, name, slug, database_name, owner_id, is_active, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct NewOrganization<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub slug: &'a str,
    pub database_name: &'a str,
    pub owner_id: Uuid,
}

pub struct OrganizationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrganizationRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        OrganizationRepository { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let row = sqlx::query_as::<_, Organization>(&format!("SELECT {} FROM organizations WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Like [`get_by_id`](Self::get_by_id), but hides organizations still provisioning
    /// or left inactive by a failed rollback.
    pub async fn get_active_by_id(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let row = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE id = $1 AND is_active",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Organization>, AppError> {
        let row = sqlx::query_as::<_, Organization>(&format!("SELECT {} FROM organizations WHERE name = $1", COLUMNS))
            .bind(name)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>, AppError> {
        let row = sqlx::query_as::<_, Organization>(&format!("SELECT {} FROM organizations WHERE slug = $1", COLUMNS))
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Organization>, AppError> {
        let rows = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE owner_id = $1 AND is_active ORDER BY created_at",
            COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Every registered tenant id, active or not.
    pub async fn list_ids(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM organizations ORDER BY created_at")
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Insert an inactive organization; it becomes visible as active only after provisioning.
    pub async fn create(&self, org: &NewOrganization<'_>) -> Result<Organization, AppError> {
        sqlx::query_as::<_, Organization>(&format!(
            "INSERT INTO organizations (id, name, slug, database_name, owner_id, is_active) \
             VALUES ($1, $2, $3, $4, $5, FALSE) RETURNING {}",
            COLUMNS
        ))
        .bind(org.id)
        .bind(org.name)
        .bind(org.slug)
        .bind(org.database_name)
        .bind(org.owner_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("organization '{}' or slug '{}' already exists", org.name, org.slug))
            } else {
                AppError::Db(e)
            }
        })
    }

    pub async fn activate(&self, id: Uuid) -> Result<Organization, AppError> {
        let row = sqlx::query_as::<_, Organization>(&format!(
            "UPDATE organizations SET is_active = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Compensating delete. Returns whether a row was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
