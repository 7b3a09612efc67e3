//! Admin API endpoints.
//!
//! Routed under `/api/admin`, so every handler runs behind the route gate
//! and can rely on [`AdminIdentity`].

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;
use tracing::debug;

use super::submissions::StorageType;
use crate::AppState;
use crate::auth::AdminIdentity;
use crate::jwt::Identity;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/me", get(current_admin))
        .route("/submissions", get(submission_counts))
        .with_state(state)
}

#[derive(Serialize)]
struct MeResponse {
    user: Identity,
}

/// The identity the gate verified for this request.
async fn current_admin(AdminIdentity(identity): AdminIdentity) -> impl IntoResponse {
    Json(MeResponse { user: identity })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionCountsResponse {
    storage_type: StorageType,
    admissions: u64,
    contacts: u64,
}

/// Submission totals from the primary store, or from the fallback store when
/// the primary store is unavailable.
async fn submission_counts(
    State(state): State<AppState>,
    AdminIdentity(identity): AdminIdentity,
) -> impl IntoResponse {
    debug!(user_id = %identity.user_id, "Submission counts requested");

    let response = match state.store.counts().await {
        Ok(counts) => SubmissionCountsResponse {
            storage_type: StorageType::Primary,
            admissions: counts.admissions.max(0) as u64,
            contacts: counts.contacts.max(0) as u64,
        },
        Err(e) => {
            debug!(error = %e, "Primary store unavailable, reporting fallback counts");
            let stats = state.fallback.stats();
            SubmissionCountsResponse {
                storage_type: StorageType::Fallback,
                admissions: stats.admissions.total as u64,
                contacts: stats.contacts.total as u64,
            }
        }
    };

    Json(response)
}
