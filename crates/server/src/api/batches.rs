//! Batch API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use gobbler_core::{BatchError, BatchRequest, ProgressRecord, Submission};

use super::handlers::error_response;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a batch
#[derive(Debug, Deserialize)]
pub struct SubmitBatchBody {
    #[serde(flatten)]
    pub request: BatchRequest,
    /// Queue the batch when it is too large or too slow to run inline
    #[serde(default)]
    pub auto_queue: bool,
}

/// Query parameters for reading progress
#[derive(Debug, Deserialize)]
pub struct ProgressParams {
    /// `json` (default) or `markdown`
    pub format: Option<String>,
}

/// Progress record plus derived completion percentage
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub record: ProgressRecord,
    pub percent: f64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a batch; runs inline (200) or is queued (202)
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SubmitBatchBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    match state.service().submit(body.request, body.auto_queue).await {
        Ok(submission @ Submission::Completed { .. }) => {
            (StatusCode::OK, Json(submission)).into_response()
        }
        Ok(submission @ Submission::Queued { .. }) => {
            (StatusCode::ACCEPTED, Json(submission)).into_response()
        }
        Err(e) => batch_error_response(e),
    }
}

/// Progress of a batch, inline or queued
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
    Query(params): Query<ProgressParams>,
) -> Response {
    match state.service().progress(&batch_id) {
        Ok(Some(record)) => match params.format.as_deref() {
            Some("markdown") => (
                [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
                record.format_report(),
            )
                .into_response(),
            _ => {
                let percent = record.percent();
                Json(ProgressResponse { record, percent }).into_response()
            }
        },
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("No progress found for batch: {}", batch_id),
        ),
        Err(e) => batch_error_response(e),
    }
}

fn batch_error_response(e: BatchError) -> Response {
    match e {
        BatchError::Setup(message) => {
            warn!(error = %message, "Rejected batch");
            error_response(StatusCode::BAD_REQUEST, message)
        }
        BatchError::Store(e) => {
            warn!(error = %e, "Progress store unavailable");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        BatchError::Queue(e) => {
            error!(error = %e, "Job queue error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
