//! tenant-server: serves the tenant-router HTTP API and runs tenant maintenance.
//!
//! `tenant-server` (or `tenant-server serve`) starts the API. `migrate-tenant <id>` and
//! `migrate-tenants` bring tenant schemas up to date; `provision-tenant <id>` creates a
//! tenant database and migrates it.

use clap::{Parser, Subcommand};
use sqlx::Connection;
use tenant_router::{build_router, ensure_database_exists, AppState, Settings, TenantId};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "tenant-server", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Apply pending migrations to one tenant database.
    MigrateTenant { tenant_id: String },
    /// Apply pending migrations to every registered organization.
    MigrateTenants,
    /// Create a tenant database if missing and migrate it.
    ProvisionTenant { tenant_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("tenant_router=info,tenant_server=info,tower_http=info")
            }),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let mut admin = sqlx::PgConnection::connect(&settings.core_admin_database_url()).await?;
    let creation = ensure_database_exists(&mut admin, &settings.core_database).await?;
    admin.close().await?;
    tracing::info!(database = %settings.core_database, ?creation, "core database ensured");

    let state = AppState::new(settings);
    state.registry.init_core().await?;

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&state).await,
        Command::MigrateTenant { tenant_id } => migrate_tenant(&state, &tenant_id).await,
        Command::MigrateTenants => migrate_tenants(&state).await,
        Command::ProvisionTenant { tenant_id } => provision_tenant(&state, &tenant_id).await,
    };
    state.registry.close_all().await;
    result
}

async fn serve(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(&state.settings.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        prefix = %state.settings.api_prefix,
        "{} listening",
        state.settings.app_name
    );
    axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn migrate_tenant(state: &AppState, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let tenant_id = TenantId::new(raw)?;
    let report = state.provisioner.migrator().apply_to(&tenant_id).await?;
    state.registry.release(&tenant_id);
    tracing::info!(tenant_id = %tenant_id, applied = ?report.applied, version = report.current_version, "tenant migrated");
    Ok(())
}

async fn migrate_tenants(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let core = state.core_pool()?;
    let outcomes = state.provisioner.migrator().apply_all(&core).await?;
    let mut failed = 0usize;
    for (tenant_id, outcome) in &outcomes {
        match outcome {
            Ok(report) => tracing::info!(tenant_id = %tenant_id, applied = ?report.applied, "tenant migrated"),
            Err(e) => {
                failed += 1;
                tracing::error!(tenant_id = %tenant_id, error = %e, "tenant migration failed");
            }
        }
    }
    tracing::info!(total = outcomes.len(), failed, "tenant migrations finished");
    if failed > 0 {
        return Err(format!("{} of {} tenant migrations failed", failed, outcomes.len()).into());
    }
    Ok(())
}

async fn provision_tenant(state: &AppState, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let tenant_id = TenantId::new(raw)?;
    let report = state.provisioner.provision_detached(tenant_id.clone()).await?;
    tracing::info!(
        tenant_id = %tenant_id,
        database = %report.database,
        creation = ?report.creation,
        applied = ?report.migrations.applied,
        "tenant provisioned"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
