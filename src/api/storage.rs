//! Storage diagnostics.
//!
//! GET `/storage-status` reports whether the primary store answers and what
//! the fallback store holds. It is not behind the route gate.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;
use tracing::debug;

use super::submissions::StorageType;
use crate::AppState;
use crate::fallback::{FallbackSnapshot, FallbackStats};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/storage-status", get(storage_status))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageStatusResponse {
    storage_type: StorageType,
    fallback: FallbackStats,
    records: FallbackSnapshot,
}

async fn storage_status(State(state): State<AppState>) -> impl IntoResponse {
    let storage_type = match state.store.counts().await {
        Ok(_) => StorageType::Primary,
        Err(e) => {
            debug!(error = %e, "Primary store unavailable");
            StorageType::Fallback
        }
    };

    Json(StorageStatusResponse {
        storage_type,
        fallback: state.fallback.stats(),
        records: state.fallback.snapshot(),
    })
}
