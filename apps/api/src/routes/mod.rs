pub mod health;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::contacts::handlers;
use crate::state::AppState;

async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "CRM Relay API",
        "version": env!("CARGO_PKG_VERSION"),
        "api": "/api/v1"
    }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/contact",
            post(handlers::handle_create_contact).patch(handlers::handle_update_contact),
        )
        .route("/api/v1/contact/note", post(handlers::handle_add_note))
        .route("/api/v1/contact/search", get(handlers::handle_search_contact))
        .with_state(state)
}
