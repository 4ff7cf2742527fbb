//! Core users.

use crate::error::{is_unique_violation, AppError};
use crate::models::CoreUser;
use sqlx::PgPool;
use uuid::Uuid;

const COLUMNS: &str = "id, email, hashed_password, full_name, is_active, created_at, updated_at";

pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        UserRepository { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<CoreUser>, AppError> {
        let row = sqlx::query_as::<_, CoreUser>(&format!("SELECT {} FROM users WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<CoreUser>, AppError> {
        let row = sqlx::query_as::<_, CoreUser>(&format!("SELECT {} FROM users WHERE email = $1", COLUMNS))
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn create(&self, email: &str, hashed_password: &str, full_name: Option<&str>) -> Result<CoreUser, AppError> {
        sqlx::query_as::<_, CoreUser>(&format!(
            "INSERT INTO users (id, email, hashed_password, full_name) VALUES ($1, $2, $3, $4) RETURNING {}",
            COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(full_name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("user with email {} already exists", email))
            } else {
                AppError::Db(e)
            }
        })
    }

    pub async fn update_full_name(&self, id: Uuid, full_name: &str) -> Result<Option<CoreUser>, AppError> {
        let row = sqlx::query_as::<_, CoreUser>(&format!(
            "UPDATE users SET full_name = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(full_name)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }
}
