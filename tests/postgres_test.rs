//! PostgreSQL-backed tests. Skipped unless `TEST_DATABASE_HOST` is set; the server
//! credentials come from `TEST_DATABASE_PORT`, `TEST_DATABASE_USER` and
//! `TEST_DATABASE_PASSWORD`. The connecting role must be allowed to create databases.

use sqlx::Connection;
use std::sync::Arc;
use tenant_router::migration::Migration;
use tenant_router::models::TenantProfileUpdate;
use tenant_router::repository::{NewOrganization, OrganizationRepository, TenantUserRepository};
use tenant_router::service::{AuthService, CreateOrganization, Credentials, OrganizationService, Registration, UserService};
use tenant_router::store::quote_ident;
use tenant_router::{
    ensure_database_exists, AppError, AppState, DatabaseCreation, Settings, TenantError, TenantId, TenantMigrator,
    TenantProvisioner,
};
use uuid::Uuid;

const CORE_DB: &str = "tenant_router_test_core";

fn settings() -> Option<Settings> {
    let host = std::env::var("TEST_DATABASE_HOST").ok()?;
    let lookup = move |key: &str| -> Option<String> {
        match key {
            "CORE_DB_HOST" => Some(host.clone()),
            "CORE_DB_PORT" => std::env::var("TEST_DATABASE_PORT").ok(),
            "CORE_DB_USER" => std::env::var("TEST_DATABASE_USER").ok(),
            "CORE_DB_PASSWORD" => std::env::var("TEST_DATABASE_PASSWORD").ok(),
            "CORE_DB_NAME" => Some(CORE_DB.into()),
            "SECRET_KEY" => Some("integration-secret".into()),
            _ => None,
        }
    };
    Some(Settings::from_lookup(lookup).unwrap())
}

async fn setup() -> Option<AppState> {
    let Some(settings) = settings() else {
        eprintln!("TEST_DATABASE_HOST not set; skipping PostgreSQL test");
        return None;
    };
    let mut admin = sqlx::PgConnection::connect(&settings.core_admin_database_url()).await.unwrap();
    ensure_database_exists(&mut admin, CORE_DB).await.unwrap();
    admin.close().await.unwrap();
    let state = AppState::new(settings);
    state.registry.init_core().await.unwrap();
    Some(state)
}

fn fresh_tenant() -> TenantId {
    TenantId::from(Uuid::new_v4())
}

async fn drop_tenant_database(state: &AppState, tenant_id: &TenantId) {
    state.registry.retire(tenant_id).await;
    let mut admin = sqlx::PgConnection::connect(&state.settings.admin_database_url()).await.unwrap();
    sqlx::query(&format!(
        "DROP DATABASE IF EXISTS {} WITH (FORCE)",
        quote_ident(&tenant_id.database_name())
    ))
    .execute(&mut admin)
    .await
    .unwrap();
    admin.close().await.unwrap();
}

#[tokio::test]
async fn create_database_is_idempotent() {
    let Some(state) = setup().await else { return };
    let tenant = fresh_tenant();

    let first = state.provisioner.create_database(&tenant).await.unwrap();
    let second = state.provisioner.create_database(&tenant).await.unwrap();
    assert_eq!(first, DatabaseCreation::Created);
    assert_eq!(second, DatabaseCreation::AlreadyExisted);

    drop_tenant_database(&state, &tenant).await;
    state.registry.close_all().await;
}

#[tokio::test]
async fn rerunning_migrations_is_a_noop() {
    let Some(state) = setup().await else { return };
    let tenant = fresh_tenant();

    let report = state.provisioner.provision(&tenant).await.unwrap();
    assert_eq!(report.database, tenant.database_name());
    assert!(!report.migrations.is_noop());

    let again = state.provisioner.migrator().apply_to(&tenant).await.unwrap();
    assert!(again.is_noop());
    assert_eq!(again.current_version, state.provisioner.migrator().latest_version());

    let handle = state.registry.resolve(&tenant).await.unwrap();
    assert!(state.provisioner.migrator().is_current(handle.pool()).await.unwrap());

    drop_tenant_database(&state, &tenant).await;
    state.registry.close_all().await;
}

#[tokio::test]
async fn unprovisioned_tenant_is_unavailable_and_unknown_to_auth() {
    let Some(state) = setup().await else { return };
    let ghost = TenantId::new("nonexistent-tenant").unwrap();

    let err = state.registry.resolve(&ghost).await.unwrap_err();
    assert!(matches!(err, TenantError::TenantDatabaseUnavailable { .. }));

    let err = AuthService::login_tenant(
        &state,
        &ghost,
        Credentials {
            email: "a@example.com".into(),
            password: "whatever".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    state.registry.close_all().await;
}

#[tokio::test]
async fn same_email_registers_in_two_tenants() {
    let Some(state) = setup().await else { return };
    let (a, b) = (fresh_tenant(), fresh_tenant());
    state.provisioner.provision(&a).await.unwrap();
    state.provisioner.provision(&b).await.unwrap();

    let registration = || Registration {
        email: "Shared@Example.com".into(),
        password: "correct horse".into(),
        full_name: Some("Shared".into()),
        phone: None,
        avatar_url: None,
    };
    let in_a = AuthService::register_tenant(&state, &a, registration()).await.unwrap();
    let in_b = AuthService::register_tenant(&state, &b, registration()).await.unwrap();
    assert_eq!(in_a.user.email, "shared@example.com");
    assert_ne!(in_a.user.id, in_b.user.id);
    assert_eq!(in_b.tenant_id.as_ref(), Some(&b));

    let dup = AuthService::register_tenant(&state, &a, registration()).await.unwrap_err();
    assert!(matches!(dup, AppError::Conflict(_)));

    let pool_a = state.registry.resolve(&a).await.unwrap().pool().clone();
    let pool_b = state.registry.resolve(&b).await.unwrap().pool().clone();
    let only_a = TenantUserRepository::get_by_id(&pool_b, in_a.user.id).await.unwrap();
    assert!(only_a.is_none(), "tenant B must not see tenant A's row");
    assert!(TenantUserRepository::get_by_id(&pool_a, in_a.user.id).await.unwrap().is_some());

    drop_tenant_database(&state, &a).await;
    drop_tenant_database(&state, &b).await;
    state.registry.close_all().await;
}

#[tokio::test]
async fn creating_acme_provisions_a_tenant_with_its_owner() {
    let Some(state) = setup().await else { return };
    let core = state.core_pool().unwrap();

    // a previous run may have left "Acme" behind
    if let Some(stale) = OrganizationRepository::new(&core).get_by_name("Acme").await.unwrap() {
        drop_tenant_database(&state, &TenantId::from(stale.id)).await;
        OrganizationRepository::new(&core).delete(stale.id).await.unwrap();
    }

    let email = format!("owner-{}@example.com", Uuid::new_v4().simple());
    let owner = AuthService::register_core(
        &state,
        Registration {
            email: email.clone(),
            password: "owner-password".into(),
            full_name: Some("Owner".into()),
            phone: None,
            avatar_url: None,
        },
    )
    .await
    .unwrap();

    let created = OrganizationService::create(
        &state,
        owner.user.id,
        CreateOrganization {
            name: "Acme".into(),
            slug: None,
        },
    )
    .await
    .unwrap();
    let org = &created.organization;
    let tenant = TenantId::from(org.id);
    assert_eq!(org.slug, "acme");
    assert_eq!(org.database_name, format!("tenant_{}", org.id));
    assert!(org.is_active);
    assert_eq!(
        created.provisioning.migrations.current_version,
        state.provisioner.migrator().latest_version()
    );

    let pool = state.registry.resolve(&tenant).await.unwrap().pool().clone();
    let synced = TenantUserRepository::get_by_email(&pool, &email).await.unwrap().unwrap();
    assert!(synced.is_owner);

    // the owner signs into the tenant with their platform password
    let login = AuthService::login_tenant(
        &state,
        &tenant,
        Credentials {
            email: email.clone(),
            password: "owner-password".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(login.user.is_owner, Some(true));

    let updated = UserService::update_tenant_profile(
        &state,
        &tenant,
        login.user.id,
        TenantProfileUpdate {
            metadata: Some(serde_json::json!({"theme": "dark"}).as_object().unwrap().clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let merged = UserService::update_tenant_profile(
        &state,
        &tenant,
        login.user.id,
        TenantProfileUpdate {
            metadata: Some(serde_json::json!({"lang": "en"}).as_object().unwrap().clone()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.metadata["theme"], "dark");
    assert_eq!(merged.metadata["theme"], "dark");
    assert_eq!(merged.metadata["lang"], "en");

    let dup = OrganizationService::create(
        &state,
        owner.user.id,
        CreateOrganization {
            name: "Acme".into(),
            slug: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(dup, AppError::Conflict(_)));

    let mine = OrganizationService::list_by_owner(&state, owner.user.id).await.unwrap();
    assert_eq!(mine.len(), 1);

    drop_tenant_database(&state, &tenant).await;
    OrganizationRepository::new(&core).delete(org.id).await.unwrap();
    state.registry.close_all().await;
}

#[tokio::test]
async fn failed_migration_quarantines_the_tenant() {
    let Some(state) = setup().await else { return };
    let tenant = fresh_tenant();
    let migrator = Arc::new(TenantMigrator::with_migrations(
        state.settings.clone(),
        vec![
            Migration {
                version: 1,
                name: "create_widgets",
                statements: &["CREATE TABLE widgets (id INT PRIMARY KEY)"],
            },
            Migration {
                version: 2,
                name: "broken",
                statements: &["ALTER TABLE no_such_table ADD COLUMN x INT"],
            },
        ],
    ));
    let provisioner = TenantProvisioner::new(state.settings.clone(), migrator, state.registry.clone());

    let err = provisioner.provision(&tenant).await.unwrap_err();
    assert!(matches!(err, TenantError::MigrationFailed { version: 2, .. }));
    assert!(state.registry.is_quarantined(&tenant));
    assert!(state.registry.resolve(&tenant).await.is_err());

    let mut conn = sqlx::PgConnection::connect(&state.settings.tenant_database_url(&tenant)).await.unwrap();
    let versions: Vec<(i64,)> = sqlx::query_as("SELECT version FROM _schema_migrations ORDER BY version")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    assert_eq!(versions, vec![(1,)]);
    conn.close().await.unwrap();

    state.registry.release(&tenant);
    // the standard migration set is not applied here, so the readiness check refuses it
    assert!(state.registry.resolve(&tenant).await.is_err());

    drop_tenant_database(&state, &tenant).await;
    state.registry.close_all().await;
}

async fn core_owner(state: &AppState) -> Uuid {
    let registered = AuthService::register_core(
        state,
        Registration {
            email: format!("owner-{}@example.com", Uuid::new_v4().simple()),
            password: "owner-password".into(),
            full_name: None,
            phone: None,
            avatar_url: None,
        },
    )
    .await
    .unwrap();
    registered.user.id
}

#[tokio::test]
async fn inactive_organization_is_not_readable() {
    let Some(state) = setup().await else { return };
    let core = state.core_pool().unwrap();
    let owner_id = core_owner(&state).await;

    let id = Uuid::new_v4();
    let suffix = id.simple().to_string();
    let database_name = TenantId::from(id).database_name();
    OrganizationRepository::new(&core)
        .create(&NewOrganization {
            id,
            name: &format!("Pending {}", suffix),
            slug: &format!("pending-{}", suffix),
            database_name: &database_name,
            owner_id,
        })
        .await
        .unwrap();

    let err = OrganizationService::get(&state, id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(OrganizationService::list_by_owner(&state, owner_id).await.unwrap().is_empty());
    assert!(OrganizationRepository::new(&core).get_by_id(id).await.unwrap().is_some());

    OrganizationRepository::new(&core).delete(id).await.unwrap();
    state.registry.close_all().await;
}

#[tokio::test]
async fn failed_provisioning_rolls_back_the_organization() {
    let Some(state) = setup().await else { return };
    let core = state.core_pool().unwrap();
    let owner_id = core_owner(&state).await;

    let broken = Arc::new(TenantMigrator::with_migrations(
        state.settings.clone(),
        vec![
            Migration {
                version: 1,
                name: "create_widgets",
                statements: &["CREATE TABLE widgets (id INT PRIMARY KEY)"],
            },
            Migration {
                version: 2,
                name: "broken",
                statements: &["ALTER TABLE no_such_table ADD COLUMN x INT"],
            },
        ],
    ));
    let state = AppState {
        provisioner: Arc::new(TenantProvisioner::new(state.settings.clone(), broken, state.registry.clone())),
        ..state
    };

    let name = format!("Doomed {}", Uuid::new_v4().simple());
    let err = OrganizationService::create(
        &state,
        owner_id,
        CreateOrganization {
            name: name.clone(),
            slug: None,
        },
    )
    .await
    .unwrap_err();
    let tenant_id = match err {
        AppError::Tenant(TenantError::MigrationFailed { tenant_id, version: 2, .. }) => tenant_id,
        other => panic!("expected a failed migration, got {other:?}"),
    };
    let tenant = TenantId::new(&tenant_id).unwrap();
    let id = Uuid::parse_str(&tenant_id).unwrap();

    let orgs = OrganizationRepository::new(&core);
    assert!(orgs.get_by_id(id).await.unwrap().is_none());
    assert!(orgs.get_by_name(&name).await.unwrap().is_none());
    assert!(OrganizationService::list_by_owner(&state, owner_id).await.unwrap().is_empty());

    // the row is gone, so the tenant leaves quarantine, but its half-migrated database still refuses service
    assert!(!state.registry.is_quarantined(&tenant));
    assert!(!state.registry.is_initialized(&tenant));
    assert!(matches!(
        state.registry.resolve(&tenant).await,
        Err(TenantError::TenantDatabaseUnavailable { .. })
    ));

    drop_tenant_database(&state, &tenant).await;
    state.registry.close_all().await;
}
