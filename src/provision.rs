//! Tenant provisioning: create the physical database, then bring its schema up to date.

use crate::config::Settings;
use crate::error::TenantError;
use crate::migration::{MigrationReport, TenantMigrator};
use crate::registry::PgRegistry;
use crate::store::{ensure_database_exists, DatabaseCreation};
use crate::tenant::TenantId;
use serde::Serialize;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Debug, Serialize)]
pub struct ProvisionReport {
    pub database: String,
    pub creation: DatabaseCreation,
    pub migrations: MigrationReport,
}

pub struct TenantProvisioner {
    settings: Arc<Settings>,
    migrator: Arc<TenantMigrator>,
    registry: Arc<PgRegistry>,
}

impl TenantProvisioner {
    pub fn new(settings: Arc<Settings>, migrator: Arc<TenantMigrator>, registry: Arc<PgRegistry>) -> Self {
        TenantProvisioner {
            settings,
            migrator,
            registry,
        }
    }

    pub fn migrator(&self) -> &Arc<TenantMigrator> {
        &self.migrator
    }

    /// Create `tenant_<id>` on the tenant server if it does not exist yet.
    pub async fn create_database(&self, tenant_id: &TenantId) -> Result<DatabaseCreation, TenantError> {
        let db_name = tenant_id.database_name();
        let failed = |source: sqlx::Error| TenantError::ProvisioningFailed {
            tenant_id: tenant_id.to_string(),
            source,
        };
        let options = PgConnectOptions::from_str(&self.settings.admin_database_url()).map_err(failed)?;
        let timeout = self.settings.pool.tenant_connect_timeout;
        let mut conn = match tokio::time::timeout(timeout, options.connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(failed(e)),
            Err(_) => return Err(failed(sqlx::Error::PoolTimedOut)),
        };
        let result = ensure_database_exists(&mut conn, &db_name).await;
        if let Err(e) = conn.close().await {
            tracing::debug!(tenant_id = %tenant_id, error = %e, "closing admin connection failed");
        }
        match result {
            Ok(creation) => {
                tracing::info!(tenant_id = %tenant_id, database = %db_name, ?creation, "tenant database ensured");
                Ok(creation)
            }
            Err(e) => {
                tracing::error!(tenant_id = %tenant_id, database = %db_name, error = %e, "tenant database creation failed");
                Err(failed(e))
            }
        }
    }

    /// Create the database and apply migrations. A failed migration quarantines the tenant
    /// so no request is routed to a half-migrated schema; success releases it.
    pub async fn provision(&self, tenant_id: &TenantId) -> Result<ProvisionReport, TenantError> {
        let creation = self.create_database(tenant_id).await?;
        match self.migrator.apply_to(tenant_id).await {
            Ok(migrations) => {
                self.registry.release(tenant_id);
                Ok(ProvisionReport {
                    database: tenant_id.database_name(),
                    creation,
                    migrations,
                })
            }
            Err(e) => {
                self.registry.quarantine(tenant_id, e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Run [`provision`](Self::provision) on its own task. Dropping the returned future
    /// (a cancelled request) does not stop provisioning.
    pub async fn provision_detached(self: &Arc<Self>, tenant_id: TenantId) -> Result<ProvisionReport, TenantError> {
        let this = Arc::clone(self);
        let task_tenant = tenant_id.clone();
        tokio::spawn(async move { this.provision(&task_tenant).await })
            .await
            .map_err(|e| TenantError::ProvisioningFailed {
                tenant_id: tenant_id.to_string(),
                source: sqlx::Error::Protocol(format!("provisioning task aborted: {}", e)),
            })?
    }
}
