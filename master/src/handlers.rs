use std::time::Instant;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use mr_common::{
    JobDoneResponse, JobStatus, TaskReply, TaskReportRequest, TaskReportResponse, TaskRequest,
    TaskSnapshot, WorkerMetrics, WorkerRegisterRequest, WorkerRegisterResponse,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::CoordinatorError;
use crate::registry::Completion;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/job", get(job_status))
        .route("/api/v1/job/done", get(job_done))
        .route("/api/v1/workers", get(list_workers))
        .route("/api/v1/workers/register", post(register_worker))
        .route("/api/v1/tasks", get(list_tasks))
        .route("/api/v1/tasks/next", post(request_task))
        .route("/api/v1/tasks/complete", post(report_done))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// InitWorker
async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<WorkerRegisterRequest>,
) -> Json<WorkerRegisterResponse> {
    let hostname = req.hostname.clone();
    let worker_id = state.workers().register(req.hostname, Instant::now());

    info!(worker_id, %hostname, "worker registrado");
    Json(WorkerRegisterResponse { worker_id })
}

// RequestTask
async fn request_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Result<Json<TaskReply>, CoordinatorError> {
    let now = Instant::now();
    state.workers().touch(req.worker_id, now)?;

    let reply = state.job().request_task(req.worker_id, now)?;

    if matches!(reply, TaskReply::Task(_)) {
        state.workers().record_started(req.worker_id);
    }
    Ok(Json(reply))
}

// ReportDone: nunca es error por reportes viejos o duplicados
async fn report_done(
    State(state): State<AppState>,
    Json(req): Json<TaskReportRequest>,
) -> Result<Json<TaskReportResponse>, CoordinatorError> {
    state.workers().touch(req.worker_id, Instant::now())?;

    let outcome = state.job().report_done(&req)?;
    let accepted = outcome == Completion::Committed;

    state.workers().record_report(req.worker_id, accepted);
    Ok(Json(TaskReportResponse { accepted }))
}

// IsJobDone
async fn job_done(State(state): State<AppState>) -> Json<JobDoneResponse> {
    Json(JobDoneResponse {
        done: state.is_done(),
    })
}

async fn job_status(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.job().status())
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskSnapshot>> {
    Json(state.job().snapshot(Instant::now()))
}

async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerMetrics>> {
    Json(state.workers().metrics(Instant::now()))
}
