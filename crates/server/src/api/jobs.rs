//! Background job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use gobbler_core::{JobInfo, QueueName};

use super::handlers::error_response;
use crate::state::AppState;

/// Maximum allowed limit for job listings
const MAX_LIMIT: usize = 100;

/// Default limit for job listings
const DEFAULT_LIMIT: usize = 20;

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Queue name (default: `default`)
    pub queue: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<usize>,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub queue: QueueName,
    pub jobs: Vec<JobInfo>,
}

/// Status of one job
pub async fn get_job(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Response {
    match state.service().job(&job_id) {
        Ok(Some(info)) => Json(info).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Job not found: {}", job_id)),
        Err(e) => {
            error!(error = %e, "Failed to read job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Most recent jobs of a queue
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Response {
    let queue = match params.queue.as_deref().unwrap_or("default").parse::<QueueName>() {
        Ok(queue) => queue,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match state.service().jobs(queue, limit) {
        Ok(jobs) => Json(ListJobsResponse { queue, jobs }).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list jobs");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
