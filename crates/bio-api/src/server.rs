//! Axum server and routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bio_calc::DistanceMatrix;
use bio_scheduler::{Scheduler, SchedulerError};
use bio_types::{
    BaseResponse, DistanceMatrixRequest, JobKindTag, JobSnapshot, JobStatus, JobTicket,
    NearestNeighborsRequest, TreeRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub scheduler: Arc<dyn Scheduler>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/nearest_neighbors", post(handle_submit_nearest_neighbors))
        .route("/v1/nearest_neighbors/:job_id", get(handle_get_nearest_neighbors))
        .route("/v1/distance_calculations", post(handle_submit_distance_matrix))
        .route("/v1/distance_calculations/:job_id", get(handle_get_distance_matrix))
        .route("/v1/trees", post(handle_submit_tree))
        .route("/v1/trees/:job_id", get(handle_get_tree))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type Reply<T> = (StatusCode, Json<BaseResponse<T>>);

fn accepted(ticket: JobTicket) -> Reply<JobTicket> {
    (
        StatusCode::ACCEPTED,
        Json(BaseResponse::ok("Job submitted", ticket)),
    )
}

fn failure<T>(status: StatusCode, message: impl Into<String>) -> Reply<T> {
    (
        status,
        Json(BaseResponse::error(i32::from(status.as_u16()), message)),
    )
}

fn scheduler_failure<T>(e: SchedulerError) -> Reply<T> {
    let status = match &e {
        SchedulerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::SourceNotReady(_) | SchedulerError::Unprocessable(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SchedulerError::Calc(_) | SchedulerError::Other(_) => {
            tracing::error!(error = %e, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    failure(status, e.to_string())
}

async fn handle_submit_nearest_neighbors(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NearestNeighborsRequest>,
) -> Reply<JobTicket> {
    match state.scheduler.submit_nearest_neighbors(req).await {
        Ok(ticket) => accepted(ticket),
        Err(e) => scheduler_failure(e),
    }
}

async fn handle_submit_distance_matrix(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DistanceMatrixRequest>,
) -> Reply<JobTicket> {
    match state.scheduler.submit_distance_matrix(req).await {
        Ok(ticket) => accepted(ticket),
        Err(e) => scheduler_failure(e),
    }
}

async fn handle_submit_tree(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TreeRequest>,
) -> Reply<JobTicket> {
    match state.scheduler.submit_tree(req).await {
        Ok(ticket) => accepted(ticket),
        Err(e) => scheduler_failure(e),
    }
}

async fn snapshot(state: &AppState, kind: JobKindTag, job_id: &str) -> Reply<JobSnapshot> {
    match state.scheduler.get_job(kind, job_id).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(BaseResponse::ok("Success", JobSnapshot::from(record))),
        ),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("{kind} job {job_id} not found")),
        Err(e) => scheduler_failure(e),
    }
}

async fn handle_get_nearest_neighbors(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Reply<JobSnapshot> {
    snapshot(&state, JobKindTag::NearestNeighbors, &job_id).await
}

async fn handle_get_tree(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Reply<JobSnapshot> {
    snapshot(&state, JobKindTag::Tree, &job_id).await
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Job record plus the persisted matrix once completed.
    #[default]
    Full,
    /// Job record without result payload.
    Status,
}

#[derive(Debug, Deserialize)]
pub struct DistanceQuery {
    #[serde(default)]
    pub level: Level,
}

#[derive(Debug, Serialize)]
pub struct DistanceView {
    #[serde(flatten)]
    pub job: JobSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_matrix: Option<DistanceMatrix>,
}

async fn handle_get_distance_matrix(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Query(q): Query<DistanceQuery>,
) -> Reply<DistanceView> {
    let (status, Json(body)) = snapshot(&state, JobKindTag::DistanceMatrix, &job_id).await;
    let mut job = match body.data {
        Some(job) => job,
        None => return failure(status, body.message),
    };
    let distance_matrix = match q.level {
        Level::Status => {
            job.result = None;
            None
        }
        Level::Full if job.status == JobStatus::Completed => {
            match state.scheduler.distance_matrix(&job_id).await {
                Ok(m) => m,
                Err(e) => return scheduler_failure(e),
            }
        }
        Level::Full => None,
    };
    (
        StatusCode::OK,
        Json(BaseResponse::ok(
            "Success",
            DistanceView {
                job,
                distance_matrix,
            },
        )),
    )
}

async fn handle_health() -> &'static str {
    "ok"
}
