//! Public form submission endpoints.
//!
//! - POST `/admissions` - Admission request
//! - POST `/contact` - Contact message
//!
//! Submissions go to the primary store. When it cannot take the write they
//! are kept in the in-memory fallback store and the client is told so.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::Serialize;
use tracing::{info, warn};

use super::error::ApiError;
use crate::AppState;
use crate::forms::{AdmissionRequest, ContactRequest};
use crate::rate_limit::rate_limit_form_submit;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/admissions", post(submit_admission))
        .route("/contact", post(submit_contact))
        .route_layer(middleware::from_fn_with_state(
            state.form_limit.clone(),
            rate_limit_form_submit,
        ))
        .with_state(state)
}

/// Where a submission ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Primary,
    Fallback,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionResponse {
    success: bool,
    message: &'static str,
    id: String,
    storage_type: StorageType,
}

fn created(message: &'static str, id: String, storage_type: StorageType) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(SubmissionResponse {
            success: true,
            message,
            id,
            storage_type,
        }),
    )
}

async fn submit_admission(
    State(state): State<AppState>,
    payload: Result<Json<AdmissionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let admission = request.validate()?;

    let (id, storage_type) = match state.store.insert_admission(&admission).await {
        Ok(id) => (id, StorageType::Primary),
        Err(e) => {
            warn!(error = %e, "Primary store rejected admission, keeping it in memory");
            let record = state.fallback.add_admission(admission);
            (record.id, StorageType::Fallback)
        }
    };

    info!(id = %id, storage = ?storage_type, "Admission request received");
    Ok(created(
        "Admission request submitted successfully",
        id,
        storage_type,
    ))
}

async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let contact = request.validate()?;

    let (id, storage_type) = match state.store.insert_contact(&contact).await {
        Ok(id) => (id, StorageType::Primary),
        Err(e) => {
            warn!(error = %e, "Primary store rejected contact message, keeping it in memory");
            let record = state.fallback.add_contact(contact);
            (record.id, StorageType::Fallback)
        }
    };

    info!(id = %id, storage = ?storage_type, "Contact message received");
    Ok(created("Message sent successfully", id, storage_type))
}
