use crate::handlers::user::{account_me, tenant_me, update_account_me, update_tenant_me};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(tenant_me).put(update_tenant_me))
        .route("/account/me", get(account_me).put(update_account_me))
}
