use crate::handlers::organization::{create, list_mine, read};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn organization_routes() -> Router<AppState> {
    Router::new()
        .route("/organizations", post(create))
        .route("/organizations/me", get(list_mine))
        .route("/organizations/:id", get(read))
}
