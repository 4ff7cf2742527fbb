//! Router assembly.

mod auth;
mod common;
mod organization;
mod user;

pub use auth::auth_routes;
pub use common::common_routes;
pub use organization::organization_routes;
pub use user::user_routes;

use crate::middleware::tenant_context;
use crate::state::AppState;
use axum::{middleware::from_fn_with_state, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Full application router: common routes at the root, the API under the configured prefix.
/// Every request runs inside a tenant-context scope.
pub fn build_router(state: AppState) -> Router {
    let prefix = state.settings.api_prefix.clone();
    let api = Router::new()
        .merge(auth_routes())
        .merge(organization_routes())
        .merge(user_routes());
    Router::new()
        .merge(common_routes())
        .nest(&prefix, api)
        .layer(from_fn_with_state(state.clone(), tenant_context))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
