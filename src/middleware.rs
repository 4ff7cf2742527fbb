//! Tenant-context middleware: every request runs in its own context scope, bound to the
//! tenant named by the configured header when one is sent.

use crate::context::TenantContext;
use crate::error::{AppError, TenantError};
use crate::state::AppState;
use crate::tenant::TenantId;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

pub async fn tenant_context(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let tenant = match tenant_from_headers(request.headers(), &state.settings.tenant_header_name) {
        Ok(tenant) => tenant,
        Err(e) => return AppError::from(e).into_response(),
    };
    if let Some(tenant_id) = &tenant {
        tracing::debug!(tenant_id = %tenant_id, "tenant bound from header");
    }
    TenantContext::scope(tenant, next.run(request)).await
}

/// An absent or blank header is no tenant; anything else must be a valid tenant id.
pub fn tenant_from_headers(headers: &HeaderMap, name: &str) -> Result<Option<TenantId>, TenantError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| TenantError::InvalidTenantId("<non-ascii header>".into()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    TenantId::new(raw).map(Some)
}
