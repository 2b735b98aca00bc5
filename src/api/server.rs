//! HTTP server implementation for the board API.
//!
//! This module provides the axum-based HTTP server exposing columns, tasks,
//! and the bulk reorder endpoints.

use axum::{
    Router,
    extract::{FromRequest, Path, Request, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, put},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    Column, ColumnUpdate, NewColumn, NewTask, ReorderColumnEntry, ReorderTaskEntry, Task,
    TaskUpdate,
};

/// JSON body extractor whose rejections are reported as [`ApiError`]s
/// (400 with a `message`) instead of axum's plain-text 422.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::invalid_value("body", rejection.body_text())),
        }
    }
}

/// Server state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    db: Arc<Database>,
}

impl ApiServer {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get the database reference.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// API root - liveness probe.
async fn api_root() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// =============================================================================
// Columns
// =============================================================================

async fn list_columns(State(state): State<ApiServer>) -> ApiResult<Json<Vec<Column>>> {
    Ok(Json(state.db().list_columns()?))
}

async fn create_column(
    State(state): State<ApiServer>,
    ApiJson(body): ApiJson<NewColumn>,
) -> ApiResult<(StatusCode, Json<Column>)> {
    let column = state
        .db()
        .create_column(body.title.as_deref(), body.color.as_deref())?;
    Ok((StatusCode::CREATED, Json(column)))
}

async fn update_column(
    State(state): State<ApiServer>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<ColumnUpdate>,
) -> ApiResult<Json<Column>> {
    let column = state
        .db()
        .update_column(id, body.title.as_deref(), body.color.as_deref())?;
    Ok(Json(column))
}

async fn delete_column(
    State(state): State<ApiServer>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db().delete_column(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_columns(
    State(state): State<ApiServer>,
    ApiJson(body): ApiJson<Vec<ReorderColumnEntry>>,
) -> ApiResult<Json<Vec<Column>>> {
    Ok(Json(state.db().reorder_columns(&body)?))
}

// =============================================================================
// Tasks
// =============================================================================

async fn list_tasks(State(state): State<ApiServer>) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.db().list_tasks()?))
}

async fn create_task(
    State(state): State<ApiServer>,
    ApiJson(body): ApiJson<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state
        .db()
        .create_task(body.title.as_deref(), body.column_id)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<ApiServer>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    let task = state
        .db()
        .update_task(id, body.title.as_deref(), body.column_id)?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<ApiServer>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db().delete_task(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_tasks(
    State(state): State<ApiServer>,
    ApiJson(body): ApiJson<Vec<ReorderTaskEntry>>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.db().reorder_tasks(&body)?))
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(api_root))
        .route("/api/health", get(health))
        .route("/api/columns", get(list_columns).post(create_column))
        .route(
            "/api/columns/{id}",
            put(update_column).delete(delete_column),
        )
        .route("/api/reorderColumns", put(reorder_columns))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
        .route("/api/reorderTasks", put(reorder_tasks))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F>(db: Arc<Database>, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ApiServer::new(db));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Board API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Board API shut down");
    Ok(())
}

/// Start the HTTP server in the background.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    db: Arc<Database>,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(ApiServer::new(db));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Board API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Board API shutting down");
            })
            .await
        {
            tracing::error!("Board API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }
}
