//! Connection registry: the routing and lifecycle authority for every database pool.
//!
//! One pool per tenant database plus one core pool. Tenant pools are created lazily on
//! first use and never create the underlying database; that is the provisioner's job.
//! Initialization is serialized per tenant so concurrent first requests for the same
//! tenant share a single pool, while the hot read path only takes a read lock.

mod postgres;

pub use postgres::PgConnector;

use crate::config::{redact_dsn, Settings};
use crate::error::{AppError, TenantError};
use crate::tenant::TenantId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Which schema definitions a handle serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaSet {
    Core,
    Tenant,
}

/// Opens and closes pools. The PostgreSQL implementation is [`PgConnector`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Pool: Clone + Send + Sync + 'static;

    /// Connect to the core database and make sure the core schema exists.
    async fn connect_core(&self, dsn: &str) -> Result<Self::Pool, TenantError>;

    /// Connect to an existing tenant database and check it is ready to serve.
    async fn connect_tenant(&self, tenant_id: &TenantId, dsn: &str) -> Result<Self::Pool, TenantError>;

    fn is_closed(&self, pool: &Self::Pool) -> bool;

    async fn close(&self, pool: &Self::Pool);
}

/// A live pool bound to exactly one database. Borrow it for one unit of work; do not
/// keep it across requests since the registry may retire and replace it.
#[derive(Debug)]
pub struct ConnectionHandle<P> {
    tenant_id: Option<TenantId>,
    dsn: String,
    schemas: SchemaSet,
    pool: P,
}

impl<P> ConnectionHandle<P> {
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// `None` for the core handle.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    /// Target DSN with the password redacted.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn schemas(&self) -> SchemaSet {
        self.schemas
    }
}

type Handle<C> = Arc<ConnectionHandle<<C as Connector>::Pool>>;

pub struct ConnectionRegistry<C: Connector = PgConnector> {
    connector: C,
    settings: Arc<Settings>,
    core: RwLock<Option<Handle<C>>>,
    core_init: tokio::sync::Mutex<()>,
    tenants: RwLock<HashMap<TenantId, Handle<C>>>,
    init_locks: Mutex<HashMap<TenantId, Arc<tokio::sync::Mutex<()>>>>,
    quarantined: RwLock<HashMap<TenantId, String>>,
    closed: AtomicBool,
}

pub type PgRegistry = ConnectionRegistry<PgConnector>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<C: Connector> ConnectionRegistry<C> {
    pub fn new(connector: C, settings: Arc<Settings>) -> Self {
        ConnectionRegistry {
            connector,
            settings,
            core: RwLock::new(None),
            core_init: tokio::sync::Mutex::new(()),
            tenants: RwLock::new(HashMap::new()),
            init_locks: Mutex::new(HashMap::new()),
            quarantined: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Establish the core pool and core schema. Idempotent; concurrent callers share one attempt.
    pub async fn init_core(&self) -> Result<Handle<C>, TenantError> {
        if let Some(handle) = read(&self.core).clone() {
            return Ok(handle);
        }
        let _guard = self.core_init.lock().await;
        if let Some(handle) = read(&self.core).clone() {
            return Ok(handle);
        }
        let dsn = self.settings.core_database_url();
        let pool = self.connector.connect_core(&dsn).await?;
        let handle = Arc::new(ConnectionHandle {
            tenant_id: None,
            dsn: redact_dsn(&dsn),
            schemas: SchemaSet::Core,
            pool,
        });
        *write(&self.core) = Some(handle.clone());
        tracing::info!(database = %handle.dsn, "core pool initialized");
        Ok(handle)
    }

    /// The core handle. Fails before [`init_core`](Self::init_core) or after [`close_all`](Self::close_all).
    pub fn core(&self) -> Result<Handle<C>, TenantError> {
        read(&self.core)
            .clone()
            .ok_or_else(|| TenantError::CoreUnavailable("core pool is not initialized".into()))
    }

    /// Create and register a pool for `tenant_id` if none exists. The database must already exist.
    pub async fn ensure_tenant(&self, tenant_id: &TenantId) -> Result<Handle<C>, TenantError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TenantError::unavailable(tenant_id.as_str(), "registry is closed"));
        }
        self.check_ready(tenant_id)?;
        if let Some(handle) = self.lookup(tenant_id) {
            return Ok(handle);
        }
        let lock = self.init_lock(tenant_id);
        let result = {
            let _guard = lock.lock().await;
            self.initialize(tenant_id).await
        };
        drop(lock);
        if result.is_err() {
            self.prune_init_lock(tenant_id);
        }
        result
    }

    /// Second half of [`ensure_tenant`](Self::ensure_tenant); the caller holds the tenant's init lock.
    async fn initialize(&self, tenant_id: &TenantId) -> Result<Handle<C>, TenantError> {
        if let Some(handle) = self.lookup(tenant_id) {
            return Ok(handle);
        }

        let dsn = self.settings.tenant_database_url(tenant_id);
        let pool = self.connector.connect_tenant(tenant_id, &dsn).await.map_err(|e| {
            tracing::warn!(tenant_id = %tenant_id, error = %e, "tenant pool initialization failed");
            e
        })?;
        if let Err(e) = self.check_ready(tenant_id) {
            // quarantined while we were connecting
            self.connector.close(&pool).await;
            return Err(e);
        }
        let handle = Arc::new(ConnectionHandle {
            tenant_id: Some(tenant_id.clone()),
            dsn: redact_dsn(&dsn),
            schemas: SchemaSet::Tenant,
            pool,
        });
        let registered = {
            let mut tenants = write(&self.tenants);
            let open = !self.closed.load(Ordering::SeqCst);
            if open {
                tenants.insert(tenant_id.clone(), handle.clone());
            }
            open
        };
        if !registered {
            self.connector.close(handle.pool()).await;
            return Err(TenantError::unavailable(tenant_id.as_str(), "registry is closed"));
        }
        tracing::info!(tenant_id = %tenant_id, database = %handle.dsn, "tenant pool initialized");
        Ok(handle)
    }

    /// Hot path: the handle for `tenant_id`, initializing it on first use and replacing
    /// a pool that has been closed underneath us.
    pub async fn resolve(&self, tenant_id: &TenantId) -> Result<Handle<C>, TenantError> {
        let handle = self.ensure_tenant(tenant_id).await?;
        if !self.connector.is_closed(handle.pool()) {
            return Ok(handle);
        }
        tracing::warn!(tenant_id = %tenant_id, "tenant pool is closed, re-initializing");
        self.retire_if_current(tenant_id, &handle).await;
        self.ensure_tenant(tenant_id).await
    }

    /// Run one unit of work against the tenant pool. A connection-class failure retires
    /// the pool and retries the work once against a fresh one.
    pub async fn with_tenant<T, F, Fut>(&self, tenant_id: &TenantId, op: F) -> Result<T, AppError>
    where
        F: Fn(C::Pool) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let handle = self.resolve(tenant_id).await?;
        match op(handle.pool().clone()).await {
            Err(AppError::Db(e)) if is_connection_error(&e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "connection lost, retrying with a fresh pool");
                self.retire_if_current(tenant_id, &handle).await;
                let handle = self.ensure_tenant(tenant_id).await?;
                match op(handle.pool().clone()).await {
                    Err(AppError::Db(e)) if is_connection_error(&e) => {
                        self.retire_if_current(tenant_id, &handle).await;
                        Err(TenantError::unavailable(tenant_id.as_str(), e).into())
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Close and remove the handle for `tenant_id`. Returns whether one existed.
    pub async fn retire(&self, tenant_id: &TenantId) -> bool {
        let lock = self.init_lock(tenant_id);
        let retired = {
            let _guard = lock.lock().await;
            let removed = write(&self.tenants).remove(tenant_id);
            match removed {
                Some(handle) => {
                    self.connector.close(handle.pool()).await;
                    tracing::info!(tenant_id = %tenant_id, "tenant pool retired");
                    true
                }
                None => false,
            }
        };
        drop(lock);
        self.prune_init_lock(tenant_id);
        retired
    }

    /// Retire only if `stale` is still the registered handle, so a pool that another
    /// task has already replaced is left alone.
    async fn retire_if_current(&self, tenant_id: &TenantId, stale: &Handle<C>) {
        let lock = self.init_lock(tenant_id);
        {
            let _guard = lock.lock().await;
            let removed = {
                let mut tenants = write(&self.tenants);
                match tenants.get(tenant_id) {
                    Some(current) if Arc::ptr_eq(current, stale) => tenants.remove(tenant_id),
                    _ => None,
                }
            };
            if let Some(handle) = removed {
                self.connector.close(handle.pool()).await;
                tracing::info!(tenant_id = %tenant_id, "stale tenant pool retired");
            }
        }
        drop(lock);
        self.prune_init_lock(tenant_id);
    }

    /// Mark `tenant_id` as not ready (e.g. half-migrated) and retire its pool.
    pub async fn quarantine(&self, tenant_id: &TenantId, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(tenant_id = %tenant_id, reason = %reason, "tenant quarantined");
        write(&self.quarantined).insert(tenant_id.clone(), reason);
        self.retire(tenant_id).await;
    }

    /// Allow `tenant_id` to be served again.
    pub fn release(&self, tenant_id: &TenantId) {
        if write(&self.quarantined).remove(tenant_id).is_some() {
            tracing::info!(tenant_id = %tenant_id, "tenant released from quarantine");
        }
    }

    pub fn is_quarantined(&self, tenant_id: &TenantId) -> bool {
        read(&self.quarantined).contains_key(tenant_id)
    }

    pub fn is_initialized(&self, tenant_id: &TenantId) -> bool {
        read(&self.tenants).contains_key(tenant_id)
    }

    pub fn initialized_tenants(&self) -> Vec<TenantId> {
        let mut ids: Vec<TenantId> = read(&self.tenants).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Release every pool, core included. Used at shutdown; afterwards no tenant pool
    /// can be registered, and an initialization still in flight closes its own pool.
    pub async fn close_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let tenants: Vec<(TenantId, Handle<C>)> = write(&self.tenants).drain().collect();
        for (tenant_id, handle) in &tenants {
            self.connector.close(handle.pool()).await;
            tracing::debug!(tenant_id = %tenant_id, "tenant pool closed");
        }
        let core = write(&self.core).take();
        if let Some(handle) = core {
            self.connector.close(handle.pool()).await;
        }
        tracing::info!(tenants = tenants.len(), "all pools closed");
    }

    fn lookup(&self, tenant_id: &TenantId) -> Option<Handle<C>> {
        read(&self.tenants).get(tenant_id).cloned()
    }

    fn check_ready(&self, tenant_id: &TenantId) -> Result<(), TenantError> {
        match read(&self.quarantined).get(tenant_id) {
            Some(reason) => Err(TenantError::unavailable(
                tenant_id.as_str(),
                format!("tenant is not ready: {}", reason),
            )),
            None => Ok(()),
        }
    }

    fn init_locks(&self) -> MutexGuard<'_, HashMap<TenantId, Arc<tokio::sync::Mutex<()>>>> {
        self.init_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_lock(&self, tenant_id: &TenantId) -> Arc<tokio::sync::Mutex<()>> {
        self.init_locks().entry(tenant_id.clone()).or_default().clone()
    }

    /// Drop the init lock of a tenant without a pool once no task holds it. Clones are
    /// only taken under the map lock, so a count of one cannot race with a new waiter.
    fn prune_init_lock(&self, tenant_id: &TenantId) {
        if self.is_initialized(tenant_id) {
            return;
        }
        let mut locks = self.init_locks();
        if locks.get(tenant_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(tenant_id);
        }
    }
}

/// Errors that mean the pool or its server connection is gone rather than the query being wrong.
pub fn is_connection_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| code.starts_with("08") || code.starts_with("57P"))
            .unwrap_or(false),
        _ => false,
    }
}
