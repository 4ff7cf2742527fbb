//! Core database DDL and database-level administration.

use sqlx::PgConnection;
use sqlx::PgPool;

/// Create the core tables if they do not exist. Safe to run on every start.
pub async fn ensure_core_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email VARCHAR(255) NOT NULL UNIQUE,
            hashed_password VARCHAR(255) NOT NULL,
            full_name VARCHAR(255),
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            slug VARCHAR(100) NOT NULL UNIQUE,
            database_name VARCHAR(100) NOT NULL UNIQUE,
            owner_id UUID NOT NULL REFERENCES users (id),
            is_active BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS organizations_owner_idx ON organizations (owner_id)")
        .execute(pool)
        .await?;
    Ok(())
}

/// Outcome of an idempotent CREATE DATABASE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseCreation {
    Created,
    AlreadyExisted,
}

/// Create `db_name` over an administrative connection unless it already exists.
/// Losing a creation race to another session (SQLSTATE 42P04) counts as already existing.
pub async fn ensure_database_exists(conn: &mut PgConnection, db_name: &str) -> Result<DatabaseCreation, sqlx::Error> {
    let exists: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(db_name)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_some() {
        return Ok(DatabaseCreation::AlreadyExisted);
    }
    match sqlx::query(&format!("CREATE DATABASE {}", quote_ident(db_name)))
        .execute(&mut *conn)
        .await
    {
        Ok(_) => Ok(DatabaseCreation::Created),
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("42P04") => Ok(DatabaseCreation::AlreadyExisted),
        Err(e) => Err(e),
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
