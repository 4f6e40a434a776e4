//! Inbound workflow callbacks.
//!
//! Not behind bearer auth: the run id in the path plus the workflow's
//! HMAC signature identify the caller.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use leadforge_core::{CallbackSummary, RunCallback};
use leadforge_relay::SIGNATURE_HEADER;

use crate::{ApiError, AppState};

#[utoipa::path(post, path = "/api/v1/hooks/runs/{id}/callback", tag = "Workflows",
    params(("id" = Uuid, Path, description = "Workflow run ID")),
    request_body = RunCallback,
    responses(
        (status = 200, description = "Callback applied", body = CallbackSummary),
        (status = 401, description = "Signature missing or invalid"),
        (status = 404, description = "Unknown run"),
        (status = 409, description = "Run already completed"),
    ))]
pub async fn run_callback(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackSummary>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let summary = state.callbacks.handle(run_id, signature, &body).await?;
    Ok(Json(summary))
}
