//! Organization creation and lookups.
//!
//! Creating an organization provisions its tenant database. The core row is inserted
//! inactive first, so its id can name the database, and is activated only once the
//! database is migrated and the owner exists inside it. Any failure after the insert
//! deletes the row again. The physical database, if created, is left in place; creation
//! is idempotent so a retry with the same id would reuse it.

use super::RequestValidator;
use crate::error::AppError;
use crate::models::{CoreUser, NewTenantUser, Organization, TenantUser};
use crate::provision::ProvisionReport;
use crate::repository::{NewOrganization, OrganizationRepository, TenantUserRepository, UserRepository};
use crate::state::AppState;
use crate::tenant::TenantId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    /// Derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrganizationCreated {
    #[serde(flatten)]
    pub organization: Organization,
    pub provisioning: ProvisionReport,
}

/// URL-friendly slug: lowercase, punctuation dropped, whitespace and hyphen runs
/// collapsed to one hyphen, no leading or trailing hyphen.
pub fn generate_slug(name: &str) -> Result<String, AppError> {
    let strip = Regex::new(r"[^\w\s-]").map_err(|e| AppError::Internal(format!("slug pattern: {}", e)))?;
    let collapse = Regex::new(r"[-\s]+").map_err(|e| AppError::Internal(format!("slug pattern: {}", e)))?;
    let lower = name.to_lowercase();
    let stripped = strip.replace_all(&lower, "");
    Ok(collapse.replace_all(&stripped, "-").trim_matches('-').to_string())
}

pub struct OrganizationService;

impl OrganizationService {
    /// Create an organization owned by `owner_id` and provision its tenant database.
    ///
    /// Runs on its own task: a client disconnect cannot stop the workflow half way
    /// and skip the rollback.
    pub async fn create(
        state: &AppState,
        owner_id: Uuid,
        input: CreateOrganization,
    ) -> Result<OrganizationCreated, AppError> {
        let name = input.name.trim().to_string();
        RequestValidator::required("name", &name)?;
        RequestValidator::max_length("name", Some(&name), 255)?;
        let slug = generate_slug(input.slug.as_deref().unwrap_or(&name))?;
        if slug.is_empty() {
            return Err(AppError::Validation("slug must contain at least one letter or digit".into()));
        }
        RequestValidator::max_length("slug", Some(&slug), 100)?;

        let state = state.clone();
        tokio::spawn(async move { create_inner(&state, owner_id, name, slug).await })
            .await
            .map_err(|e| AppError::Internal(format!("organization workflow aborted: {}", e)))?
    }

    pub async fn get(state: &AppState, id: Uuid) -> Result<Organization, AppError> {
        let pool = state.core_pool()?;
        OrganizationRepository::new(&pool)
            .get_active_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("organization {} not found", id)))
    }

    pub async fn list_by_owner(state: &AppState, owner_id: Uuid) -> Result<Vec<Organization>, AppError> {
        let pool = state.core_pool()?;
        OrganizationRepository::new(&pool).list_by_owner(owner_id).await
    }
}

async fn create_inner(
    state: &AppState,
    owner_id: Uuid,
    name: String,
    slug: String,
) -> Result<OrganizationCreated, AppError> {
    let core = state.core_pool()?;
    let owner = UserRepository::new(&core)
        .get_by_id(owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", owner_id)))?;

    let orgs = OrganizationRepository::new(&core);
    if orgs.get_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict(format!("organization with name '{}' already exists", name)));
    }
    if orgs.get_by_slug(&slug).await?.is_some() {
        return Err(AppError::Conflict(format!("organization with slug '{}' already exists", slug)));
    }

    let id = Uuid::new_v4();
    let tenant_id = TenantId::from(id);
    let database_name = tenant_id.database_name();
    orgs.create(&NewOrganization {
        id,
        name: &name,
        slug: &slug,
        database_name: &database_name,
        owner_id,
    })
    .await?;
    tracing::info!(tenant_id = %tenant_id, slug = %slug, "organization registered, provisioning");

    match provision_and_activate(state, &core, id, &tenant_id, &owner).await {
        Ok((organization, provisioning)) => {
            tracing::info!(tenant_id = %tenant_id, database = %database_name, "organization active");
            Ok(OrganizationCreated {
                organization,
                provisioning,
            })
        }
        Err(e) => {
            rollback(state, &core, &tenant_id, id).await;
            Err(e)
        }
    }
}

async fn provision_and_activate(
    state: &AppState,
    core: &PgPool,
    id: Uuid,
    tenant_id: &TenantId,
    owner: &CoreUser,
) -> Result<(Organization, ProvisionReport), AppError> {
    let report = state.provisioner.provision(tenant_id).await?;
    let handle = state.registry.ensure_tenant(tenant_id).await?;
    let synced = sync_owner(handle.pool(), owner).await?;
    tracing::debug!(tenant_id = %tenant_id, user_id = %synced.id, "owner synced into tenant");
    let organization = OrganizationRepository::new(core).activate(id).await?;
    Ok((organization, report))
}

/// Make the core owner an owner user inside the tenant, reusing their core credentials.
async fn sync_owner(pool: &PgPool, owner: &CoreUser) -> Result<TenantUser, AppError> {
    match TenantUserRepository::get_by_email(pool, &owner.email).await? {
        Some(existing) if existing.is_owner => Ok(existing),
        Some(existing) => TenantUserRepository::mark_owner(pool, existing.id).await,
        None => {
            TenantUserRepository::create(
                pool,
                &NewTenantUser {
                    email: owner.email.clone(),
                    hashed_password: owner.hashed_password.clone(),
                    full_name: owner.full_name.clone(),
                    is_owner: true,
                    ..Default::default()
                },
            )
            .await
        }
    }
}

async fn rollback(state: &AppState, core: &PgPool, tenant_id: &TenantId, id: Uuid) {
    state.registry.retire(tenant_id).await;
    match OrganizationRepository::new(core).delete(id).await {
        Ok(_) => {
            // organization ids are never reused
            state.registry.release(tenant_id);
            tracing::warn!(
                tenant_id = %tenant_id,
                database = %tenant_id.database_name(),
                "organization creation rolled back; tenant database left in place"
            )
        }
        Err(e) => tracing::error!(
            tenant_id = %tenant_id,
            error = %e,
            "organization rollback failed; inactive row remains"
        ),
    }
}
