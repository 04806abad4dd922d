//! Operational HTTP surface: health, lease introspection, task restart.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use vantry_application::{LeaseService, ReminderScheduler, ScheduleOutcome};
use vantry_core::AppError;

/// Shared state of the ops router.
#[derive(Clone)]
pub struct OpsState {
    /// This instance's trigger registry.
    pub scheduler: Arc<ReminderScheduler>,
    /// This instance's lease manager.
    pub leases: Arc<LeaseService>,
}

/// Builds the ops router.
pub fn build_router(state: OpsState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ops/leases/{task_name}", get(lease_status_handler))
        .route("/ops/tasks/{task_name}/restart", post(restart_task_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error payload for ops responses.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// HTTP error wrapper around core application errors.
#[derive(Debug)]
struct OpsError(AppError);

impl From<AppError> for OpsError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for OpsError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorResponse {
            message: self.0.to_string(),
        });

        (status, payload).into_response()
    }
}

type OpsResult<T> = Result<T, OpsError>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    scheduled_tasks: Vec<String>,
}

async fn health_handler(State(state): State<OpsState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        scheduled_tasks: state.scheduler.scheduled_task_names().await,
    })
}

#[derive(Debug, Serialize)]
struct LeaseStatusResponse {
    held: bool,
    holder_id: Option<String>,
    acquired_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    is_mine: bool,
}

async fn lease_status_handler(
    State(state): State<OpsState>,
    Path(task_name): Path<String>,
) -> OpsResult<Json<LeaseStatusResponse>> {
    let status = state.leases.status(task_name.as_str()).await?;

    Ok(Json(LeaseStatusResponse {
        held: status.held,
        holder_id: status.holder_id,
        acquired_at: status.acquired_at,
        expires_at: status.expires_at,
        is_mine: status.is_mine,
    }))
}

#[derive(Debug, Serialize)]
struct RestartTaskResponse {
    scheduled: bool,
    next_fire: Option<DateTime<Utc>>,
    reason: Option<String>,
}

async fn restart_task_handler(
    State(state): State<OpsState>,
    Path(task_name): Path<String>,
) -> OpsResult<Json<RestartTaskResponse>> {
    match state.scheduler.restart(task_name.as_str()).await? {
        ScheduleOutcome::Scheduled { next_fire } => Ok(Json(RestartTaskResponse {
            scheduled: true,
            next_fire: Some(next_fire),
            reason: None,
        })),
        ScheduleOutcome::InvalidPolicy(reason) => Ok(Json(RestartTaskResponse {
            scheduled: false,
            next_fire: None,
            reason: Some(reason),
        })),
    }
}
