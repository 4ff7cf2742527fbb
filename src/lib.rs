//! Tenant router: database-per-tenant PostgreSQL backend library.
//!
//! Each organization owns a PostgreSQL database named `tenant_<id>`. The
//! [`ConnectionRegistry`] keeps one pool per tenant plus the core pool, the
//! [`TenantProvisioner`] creates and migrates tenant databases, and
//! [`TenantContext`] carries the current tenant through a request.

pub mod config;
pub mod context;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod provision;
pub mod registry;
pub mod repository;
pub mod response;
pub mod routes;
pub mod security;
pub mod service;
pub mod state;
pub mod store;
pub mod tenant;

pub use config::Settings;
pub use context::TenantContext;
pub use error::{AppError, ConfigError, TenantError};
pub use migration::{MigrationReport, TenantMigrator, TENANT_MIGRATIONS};
pub use provision::{ProvisionReport, TenantProvisioner};
pub use registry::{ConnectionHandle, ConnectionRegistry, Connector, PgConnector, PgRegistry, SchemaSet};
pub use routes::build_router;
pub use state::AppState;
pub use store::{ensure_core_schema, ensure_database_exists, DatabaseCreation};
pub use tenant::TenantId;
