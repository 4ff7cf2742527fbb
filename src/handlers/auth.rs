//! Register and login. A tenant header switches both to the tenant's own user table.

use crate::error::AppError;
use crate::extractors::OptionalTenant;
use crate::response::{created, ok, One};
use crate::service::{AuthResponse, AuthService, Credentials, Registration};
use crate::state::AppState;
use axum::{extract::State, Json};

pub async fn register(
    State(state): State<AppState>,
    OptionalTenant(tenant): OptionalTenant,
    Json(body): Json<Registration>,
) -> Result<One<AuthResponse>, AppError> {
    let response = match tenant {
        Some(tenant_id) => AuthService::register_tenant(&state, &tenant_id, body).await?,
        None => AuthService::register_core(&state, body).await?,
    };
    Ok(created(response))
}

pub async fn login(
    State(state): State<AppState>,
    OptionalTenant(tenant): OptionalTenant,
    Json(body): Json<Credentials>,
) -> Result<One<AuthResponse>, AppError> {
    let response = match tenant {
        Some(tenant_id) => AuthService::login_tenant(&state, &tenant_id, body).await?,
        None => AuthService::login_core(&state, body).await?,
    };
    Ok(ok(response))
}
