//! Profile handlers: `/users/me` inside a tenant, `/account/me` on the platform.

use crate::error::AppError;
use crate::extractors::{CoreAuth, TenantAuth};
use crate::models::{TenantProfileUpdate, TenantUser};
use crate::response::{ok, One};
use crate::service::{CoreProfile, CoreProfileUpdate, UserService};
use crate::state::AppState;
use axum::{extract::State, Json};

pub async fn tenant_me(State(state): State<AppState>, auth: TenantAuth) -> Result<One<TenantUser>, AppError> {
    let user = UserService::tenant_profile(&state, &auth.tenant_id, auth.user_id).await?;
    Ok(ok(user))
}

pub async fn update_tenant_me(
    State(state): State<AppState>,
    auth: TenantAuth,
    Json(body): Json<TenantProfileUpdate>,
) -> Result<One<TenantUser>, AppError> {
    let user = UserService::update_tenant_profile(&state, &auth.tenant_id, auth.user_id, body).await?;
    Ok(ok(user))
}

pub async fn account_me(State(state): State<AppState>, auth: CoreAuth) -> Result<One<CoreProfile>, AppError> {
    let profile = UserService::core_profile(&state, auth.user_id).await?;
    Ok(ok(profile))
}

pub async fn update_account_me(
    State(state): State<AppState>,
    auth: CoreAuth,
    Json(body): Json<CoreProfileUpdate>,
) -> Result<One<CoreProfile>, AppError> {
    let profile = UserService::update_core_profile(&state, auth.user_id, body).await?;
    Ok(ok(profile))
}
