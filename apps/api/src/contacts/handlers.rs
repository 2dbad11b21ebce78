use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::contacts::dto::{
    ContactOutcome, CreateContactRequest, NoteRequest, SearchOutcome, UpdateContactRequest,
};
use crate::contacts::service;
use crate::errors::CorrelatedError;
use crate::state::AppState;

/// One opaque token per invocation, used only for log tracing. Never
/// persisted.
fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// POST /api/v1/contact
pub async fn handle_create_contact(
    State(state): State<AppState>,
    Json(req): Json<CreateContactRequest>,
) -> Result<Json<ContactOutcome>, CorrelatedError> {
    let correlation_id = new_correlation_id();
    info!("[{correlation_id}] POST /api/v1/contact - name '{}'", req.name);

    service::create_contact(state.store.as_ref(), state.crm.as_ref(), &req, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| e.with_correlation(correlation_id))
}

/// POST /api/v1/contact/note
pub async fn handle_add_note(
    State(state): State<AppState>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<ContactOutcome>, CorrelatedError> {
    let correlation_id = new_correlation_id();
    info!("[{correlation_id}] POST /api/v1/contact/note - contact {}", req.contact_id);

    service::add_note(state.store.as_ref(), state.crm.as_ref(), &req, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| e.with_correlation(correlation_id))
}

/// PATCH /api/v1/contact
pub async fn handle_update_contact(
    State(state): State<AppState>,
    Json(req): Json<UpdateContactRequest>,
) -> Result<Json<ContactOutcome>, CorrelatedError> {
    let correlation_id = new_correlation_id();
    info!("[{correlation_id}] PATCH /api/v1/contact - contact {}", req.contact_id);

    service::update_contact(state.store.as_ref(), state.crm.as_ref(), &req, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| e.with_correlation(correlation_id))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// GET /api/v1/contact/search?q=
pub async fn handle_search_contact(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchOutcome>, CorrelatedError> {
    let correlation_id = new_correlation_id();
    info!("[{correlation_id}] GET /api/v1/contact/search - query '{}'", params.q);

    service::search_contact(state.store.as_ref(), state.crm.as_ref(), &params.q, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| e.with_correlation(correlation_id))
}
