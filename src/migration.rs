//! Versioned tenant schema migrations.
//!
//! Only tenant tables live here; the core schema is in `store`. Each step runs in its own
//! transaction and is recorded in `_schema_migrations`, so a failing step leaves nothing
//! committed and re-running against a migrated database applies nothing.

use crate::config::Settings;
use crate::error::TenantError;
use crate::tenant::TenantId;
use serde::Serialize;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection, PgConnection, PgPool};
use std::str::FromStr;
use std::sync::Arc;

const MIGRATIONS_TABLE: &str = "_schema_migrations";

/// Session advisory lock serializing migrators on one tenant database.
const MIGRATION_LOCK_KEY: i64 = 0x7465_6e61_6e74; // "tenant"

#[derive(Clone, Debug)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

pub const TENANT_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        statements: &[r#"
            CREATE TABLE users (
                id UUID PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                hashed_password VARCHAR(255) NOT NULL,
                full_name VARCHAR(255),
                phone VARCHAR(50),
                avatar_url VARCHAR(500),
                is_owner BOOLEAN NOT NULL DEFAULT FALSE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#],
    },
    Migration {
        version: 2,
        name: "index_users_owner",
        statements: &["CREATE INDEX users_is_owner_idx ON users (is_owner) WHERE is_owner"],
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Versions applied by this run, in order.
    pub applied: Vec<i64>,
    pub current_version: i64,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

pub struct TenantMigrator {
    settings: Arc<Settings>,
    migrations: Vec<Migration>,
}

impl TenantMigrator {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self::with_migrations(settings, TENANT_MIGRATIONS.to_vec())
    }

    pub fn with_migrations(settings: Arc<Settings>, mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by_key(|m| m.version);
        TenantMigrator { settings, migrations }
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    /// Apply every pending migration to the tenant's database over a dedicated connection,
    /// which is closed afterwards whatever the outcome.
    pub async fn apply_to(&self, tenant_id: &TenantId) -> Result<MigrationReport, TenantError> {
        let dsn = self.settings.tenant_database_url(tenant_id);
        let timeout = self.settings.pool.tenant_connect_timeout;
        let options = PgConnectOptions::from_str(&dsn).map_err(|e| fail(tenant_id, 0, e))?;
        let mut conn = match tokio::time::timeout(timeout, options.connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(fail(tenant_id, 0, e)),
            Err(_) => return Err(fail(tenant_id, 0, sqlx::Error::PoolTimedOut)),
        };

        let result = self.run_pending(&mut conn, tenant_id).await;
        if let Err(e) = conn.close().await {
            tracing::debug!(tenant_id = %tenant_id, error = %e, "closing migration connection failed");
        }
        match &result {
            Ok(report) if report.is_noop() => {
                tracing::debug!(tenant_id = %tenant_id, version = report.current_version, "tenant schema already current")
            }
            Ok(report) => tracing::info!(
                tenant_id = %tenant_id,
                applied = ?report.applied,
                version = report.current_version,
                "tenant migrations applied"
            ),
            Err(e) => tracing::error!(tenant_id = %tenant_id, error = %e, "tenant migration failed"),
        }
        result
    }

    async fn run_pending(&self, conn: &mut PgConnection, tenant_id: &TenantId) -> Result<MigrationReport, TenantError> {
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *conn)
            .await
            .map_err(|e| fail(tenant_id, 0, e))?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            MIGRATIONS_TABLE
        ))
        .execute(&mut *conn)
        .await
        .map_err(|e| fail(tenant_id, 0, e))?;

        let done: Vec<(i64,)> = sqlx::query_as(&format!("SELECT version FROM {}", MIGRATIONS_TABLE))
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| fail(tenant_id, 0, e))?;
        let done: std::collections::HashSet<i64> = done.into_iter().map(|(v,)| v).collect();

        let mut applied = Vec::new();
        for m in self.migrations.iter().filter(|m| !done.contains(&m.version)) {
            let mut tx = conn.begin().await.map_err(|e| fail(tenant_id, m.version, e))?;
            for statement in m.statements {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| fail(tenant_id, m.version, e))?;
            }
            sqlx::query(&format!("INSERT INTO {} (version, name) VALUES ($1, $2)", MIGRATIONS_TABLE))
                .bind(m.version)
                .bind(m.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| fail(tenant_id, m.version, e))?;
            tx.commit().await.map_err(|e| fail(tenant_id, m.version, e))?;
            tracing::debug!(tenant_id = %tenant_id, version = m.version, name = m.name, "migration step committed");
            applied.push(m.version);
        }

        if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *conn)
            .await
        {
            tracing::debug!(tenant_id = %tenant_id, error = %e, "releasing migration lock failed");
        }
        Ok(MigrationReport {
            applied,
            current_version: self.latest_version(),
        })
    }

    /// Whether every known migration is recorded in the database behind `pool`.
    pub async fn is_current(&self, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(MIGRATIONS_TABLE)
            .fetch_one(pool)
            .await?;
        if !exists {
            return Ok(self.migrations.is_empty());
        }
        let rows: Vec<(i64,)> = sqlx::query_as(&format!("SELECT version FROM {}", MIGRATIONS_TABLE))
            .fetch_all(pool)
            .await?;
        let done: std::collections::HashSet<i64> = rows.into_iter().map(|(v,)| v).collect();
        Ok(self.migrations.iter().all(|m| done.contains(&m.version)))
    }

    /// Apply pending migrations to every organization registered in the core database.
    pub async fn apply_all(
        &self,
        core: &PgPool,
    ) -> Result<Vec<(TenantId, Result<MigrationReport, TenantError>)>, sqlx::Error> {
        let ids = crate::repository::OrganizationRepository::new(core).list_ids().await?;
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let tenant_id = TenantId::from(id);
            let outcome = self.apply_to(&tenant_id).await;
            outcomes.push((tenant_id, outcome));
        }
        Ok(outcomes)
    }
}

fn fail(tenant_id: &TenantId, version: i64, source: sqlx::Error) -> TenantError {
    TenantError::MigrationFailed {
        tenant_id: tenant_id.to_string(),
        version,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Arc<Settings> {
        Arc::new(Settings::from_lookup(|k| (k == "SECRET_KEY").then(|| "x".to_string())).unwrap())
    }

    #[test]
    fn versions_are_strictly_increasing() {
        assert!(TENANT_MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert!(TENANT_MIGRATIONS.iter().all(|m| m.version > 0 && !m.statements.is_empty()));
    }

    #[test]
    fn tenant_migrations_never_touch_core_tables() {
        for m in TENANT_MIGRATIONS {
            for s in m.statements {
                assert!(!s.to_lowercase().contains("organizations"), "migration {} references core tables", m.version);
            }
        }
    }

    #[test]
    fn with_migrations_orders_by_version() {
        let migrator = TenantMigrator::with_migrations(
            settings(),
            vec![
                Migration { version: 3, name: "c", statements: &["SELECT 3"] },
                Migration { version: 1, name: "a", statements: &["SELECT 1"] },
            ],
        );
        let versions: Vec<i64> = migrator.migrations().iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 3]);
        assert_eq!(migrator.latest_version(), 3);
    }

    #[test]
    fn empty_migrator_reports_version_zero() {
        assert_eq!(TenantMigrator::with_migrations(settings(), Vec::new()).latest_version(), 0);
    }

    #[test]
    fn failures_carry_tenant_and_version() {
        let err = fail(&TenantId::new("t9").unwrap(), 2, sqlx::Error::PoolTimedOut);
        assert!(matches!(err, TenantError::MigrationFailed { ref tenant_id, version: 2, .. } if tenant_id == "t9"));
    }
}
