//! Organization handlers. All require a core token.

use crate::error::AppError;
use crate::extractors::CoreAuth;
use crate::models::Organization;
use crate::response::{created, many, ok, Many, One};
use crate::service::{CreateOrganization, OrganizationCreated, OrganizationService};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};

pub async fn create(
    State(state): State<AppState>,
    auth: CoreAuth,
    Json(body): Json<CreateOrganization>,
) -> Result<One<OrganizationCreated>, AppError> {
    let org = OrganizationService::create(&state, auth.user_id, body).await?;
    Ok(created(org))
}

pub async fn list_mine(State(state): State<AppState>, auth: CoreAuth) -> Result<Many<Organization>, AppError> {
    let orgs = OrganizationService::list_by_owner(&state, auth.user_id).await?;
    Ok(many(orgs))
}

pub async fn read(
    State(state): State<AppState>,
    _auth: CoreAuth,
    Path(id): Path<String>,
) -> Result<One<Organization>, AppError> {
    let id = uuid::Uuid::parse_str(&id).map_err(|_| AppError::BadRequest("invalid organization id".into()))?;
    let org = OrganizationService::get(&state, id).await?;
    Ok(ok(org))
}
