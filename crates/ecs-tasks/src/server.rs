//! HTTP surface over [`ClusterTasks`] for automation that prefers HTTP.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::inspector::{ClusterTasks, DnsResolution, InspectError};
use crate::providers::ControlPlaneError;

/// Build the task router.
pub fn build_router(tasks: Arc<ClusterTasks>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tasks", get(list_handler))
        .route("/tasks/{task_id}", get(describe_handler))
        .route("/tasks/{task_id}/dns", get(dns_handler))
        .route("/tasks/{task_id}/stop", post(stop_handler))
        .route("/drain", post(drain_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(tasks)
}

/// Error body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for InspectError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Provider { source, .. } => match source {
                ControlPlaneError::NotFound { .. } => StatusCode::NOT_FOUND,
                ControlPlaneError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::NoContainerInstance { .. }
            | Self::ContainerInstanceNotFound(_)
            | Self::MissingInstanceId(_)
            | Self::ComputeInstanceNotFound(_) => StatusCode::NOT_FOUND,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Running task listing.
#[derive(Debug, Serialize)]
struct TaskListResponse {
    cluster: String,
    service: String,
    task_arns: Vec<String>,
    joined: String,
}

async fn list_handler(
    State(tasks): State<Arc<ClusterTasks>>,
) -> Result<Json<TaskListResponse>, InspectError> {
    let set = tasks.list_running_tasks().await?;
    Ok(Json(TaskListResponse {
        cluster: tasks.config().cluster_name.clone(),
        service: tasks.config().service_name.clone(),
        joined: set.joined(),
        task_arns: set.into_iter().collect(),
    }))
}

async fn describe_handler(
    State(tasks): State<Arc<ClusterTasks>>,
    Path(task_id): Path<String>,
) -> Result<Response, InspectError> {
    Ok(match tasks.describe_task(&task_id).await? {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Task not found: {task_id}"),
            }),
        )
            .into_response(),
    })
}

async fn dns_handler(
    State(tasks): State<Arc<ClusterTasks>>,
    Path(task_id): Path<String>,
) -> Result<Response, InspectError> {
    let resolution = tasks.resolve_task_instance_dns(&task_id).await?;
    let status = match resolution {
        DnsResolution::TaskNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    Ok((status, Json(resolution)).into_response())
}

async fn stop_handler(
    State(tasks): State<Arc<ClusterTasks>>,
    Path(task_id): Path<String>,
) -> Result<Response, InspectError> {
    let outcome = tasks.stop_task(&tasks.cluster_arn(), &task_id).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)).into_response())
}

async fn drain_handler(
    State(tasks): State<Arc<ClusterTasks>>,
) -> Result<Response, InspectError> {
    let report = tasks.drain_service().await?;
    Ok(Json(report).into_response())
}
