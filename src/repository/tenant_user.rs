//! Users inside a tenant database. Every call takes the tenant pool it runs against.

use crate::error::{is_unique_violation, AppError};
use crate::models::{NewTenantUser, TenantProfileUpdate, TenantUser};
use sqlx::PgPool;
use uuid::Uuid;

const COLUMNS: &str =
    "id, email, hashed_password, full_name, phone, avatar_url, is_owner, is_active, metadata, created_at, updated_at";

pub struct TenantUserRepository;

impl TenantUserRepository {
    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<TenantUser>, AppError> {
        let row = sqlx::query_as::<_, TenantUser>(&format!("SELECT {} FROM users WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<TenantUser>, AppError> {
        let row = sqlx::query_as::<_, TenantUser>(&format!("SELECT {} FROM users WHERE email = $1", COLUMNS))
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, user: &NewTenantUser) -> Result<TenantUser, AppError> {
        sqlx::query_as::<_, TenantUser>(&format!(
            "INSERT INTO users (id, email, hashed_password, full_name, phone, avatar_url, is_owner) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.avatar_url)
        .bind(user.is_owner)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("user with email {} already exists in this tenant", user.email))
            } else {
                AppError::Db(e)
            }
        })
    }

    pub async fn mark_owner(pool: &PgPool, id: Uuid) -> Result<TenantUser, AppError> {
        let row = sqlx::query_as::<_, TenantUser>(&format!(
            "UPDATE users SET is_owner = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Apply a partial update; metadata keys are merged into the stored object.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        update: &TenantProfileUpdate,
    ) -> Result<Option<TenantUser>, AppError> {
        let metadata = update.metadata.clone().map(serde_json::Value::Object);
        let row = sqlx::query_as::<_, TenantUser>(&format!(
            "UPDATE users SET \
                full_name = COALESCE($2, full_name), \
                phone = COALESCE($3, phone), \
                avatar_url = COALESCE($4, avatar_url), \
                metadata = CASE WHEN $5::jsonb IS NULL THEN metadata ELSE metadata || $5::jsonb END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(&update.full_name)
        .bind(&update.phone)
        .bind(&update.avatar_url)
        .bind(metadata)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }
}
