//! Shared application state for all routes: settings, the connection registry and the provisioner.

use crate::config::Settings;
use crate::error::AppError;
use crate::migration::TenantMigrator;
use crate::provision::TenantProvisioner;
use crate::registry::{ConnectionRegistry, PgConnector, PgRegistry};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<PgRegistry>,
    pub provisioner: Arc<TenantProvisioner>,
}

impl AppState {
    /// Wire the registry, migrator and provisioner. No connection is opened here;
    /// call `registry.init_core()` before serving.
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let migrator = Arc::new(TenantMigrator::new(settings.clone()));
        let connector = PgConnector::new(settings.pool.clone(), migrator.clone());
        let registry = Arc::new(ConnectionRegistry::new(connector, settings.clone()));
        let provisioner = Arc::new(TenantProvisioner::new(settings.clone(), migrator, registry.clone()));
        AppState {
            settings,
            registry,
            provisioner,
        }
    }

    pub fn core_pool(&self) -> Result<PgPool, AppError> {
        Ok(self.registry.core()?.pool().clone())
    }
}
