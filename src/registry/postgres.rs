//! PostgreSQL connector: sqlx pools with bounded connect time and per-statement timeouts.

use super::Connector;
use crate::config::PoolSettings;
use crate::error::TenantError;
use crate::migration::TenantMigrator;
use crate::store::ensure_core_schema;
use crate::tenant::TenantId;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone)]
pub struct PgConnector {
    pool: PoolSettings,
    migrator: Arc<TenantMigrator>,
}

impl PgConnector {
    pub fn new(pool: PoolSettings, migrator: Arc<TenantMigrator>) -> Self {
        PgConnector { pool, migrator }
    }

    fn connect_options(&self, dsn: &str) -> Result<PgConnectOptions, sqlx::Error> {
        let statement_timeout = self.pool.statement_timeout.as_millis().to_string();
        Ok(PgConnectOptions::from_str(dsn)?.options([("statement_timeout", statement_timeout)]))
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Pool = PgPool;

    async fn connect_core(&self, dsn: &str) -> Result<PgPool, TenantError> {
        let options = self
            .connect_options(dsn)
            .map_err(|e| TenantError::CoreUnavailable(e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(self.pool.core_max_connections)
            .idle_timeout(Some(self.pool.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| TenantError::CoreUnavailable(e.to_string()))?;
        ensure_core_schema(&pool)
            .await
            .map_err(|e| TenantError::CoreUnavailable(format!("core schema: {}", e)))?;
        Ok(pool)
    }

    async fn connect_tenant(&self, tenant_id: &TenantId, dsn: &str) -> Result<PgPool, TenantError> {
        let options = self
            .connect_options(dsn)
            .map_err(|e| TenantError::unavailable(tenant_id.as_str(), e))?;
        let timeout = self.pool.tenant_connect_timeout;
        let connect = PgPoolOptions::new()
            .max_connections(self.pool.tenant_max_connections)
            .acquire_timeout(timeout)
            .idle_timeout(Some(self.pool.idle_timeout))
            .connect_with(options);
        let pool = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => return Err(TenantError::unavailable(tenant_id.as_str(), e)),
            Err(_) => {
                return Err(TenantError::unavailable(
                    tenant_id.as_str(),
                    format!("connect timed out after {:?}", timeout),
                ))
            }
        };

        match self.migrator.is_current(&pool).await {
            Ok(true) => Ok(pool),
            Ok(false) => {
                pool.close().await;
                Err(TenantError::unavailable(
                    tenant_id.as_str(),
                    format!("schema is not at version {}", self.migrator.latest_version()),
                ))
            }
            Err(e) => {
                pool.close().await;
                Err(TenantError::unavailable(tenant_id.as_str(), e))
            }
        }
    }

    fn is_closed(&self, pool: &PgPool) -> bool {
        pool.is_closed()
    }

    async fn close(&self, pool: &PgPool) {
        pool.close().await;
    }
}
