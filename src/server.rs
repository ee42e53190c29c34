//! HTTP request surface over the discovery engine.

use std::future::Future;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::DiscoveryEngine;
use crate::error::{DiscoveryError, Result};

const DEFAULT_LIST_LIMIT: usize = 20;

/// HTTP front end for a [`DiscoveryEngine`].
pub struct DiscoveryServer {
    engine: DiscoveryEngine,
    default_max_total_items: usize,
    allowed_origins: Vec<String>,
}

impl DiscoveryServer {
    pub fn new(
        engine: DiscoveryEngine,
        default_max_total_items: usize,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            engine,
            default_max_total_items,
            allowed_origins,
        }
    }

    /// Bind 127.0.0.1:`port` and serve until Ctrl-C.
    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            DiscoveryError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to bind to {}: {}. Set http_server.port in config.toml to use another port.",
                    addr, e
                ),
            ))
        })?;
        log::info!("Discovery API listening on http://{}", addr);

        self.serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Serve on an already bound listener until `shutdown` resolves, then stop running tasks.
    pub async fn serve_with_shutdown<F>(
        &self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                DiscoveryError::Io(std::io::Error::other(format!("HTTP server error: {}", e)))
            })?;

        log::info!("Discovery API stopped, cancelling running tasks");
        self.engine.shutdown();
        Ok(())
    }

    pub fn router(&self) -> Router {
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let state = AppState {
            engine: self.engine.clone(),
            default_max_total_items: self.default_max_total_items,
        };

        Router::new()
            .route("/discoveries", post(handle_start).get(handle_list))
            .route("/discoveries/:id", get(handle_get))
            .route("/discoveries/:id/nodes", get(handle_nodes))
            .route("/discoveries/:id/cancel", post(handle_cancel))
            .route("/discoveries/:id/resume", post(handle_resume))
            .route("/health", get(handle_health))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(state)
    }
}

#[derive(Clone)]
struct AppState {
    engine: DiscoveryEngine,
    default_max_total_items: usize,
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    seed: String,
    #[serde(default = "default_seed_kind")]
    seed_kind: String,
    max_total_items: Option<usize>,
}

fn default_seed_kind() -> String {
    "keyword".to_string()
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

/// Maps engine errors onto HTTP statuses with a JSON body.
struct ApiError(DiscoveryError);

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DiscoveryError::InvalidSeed(_) | DiscoveryError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            DiscoveryError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            DiscoveryError::InvalidState(_) => StatusCode::CONFLICT,
            _ => {
                log::error!("Discovery API request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn handle_start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> std::result::Result<Response, ApiError> {
    let max_total_items = request
        .max_total_items
        .unwrap_or(state.default_max_total_items);
    let task_id = state
        .engine
        .start_discovery(&request.seed, &request.seed_kind, max_total_items)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "task_id": task_id, "status": "running" })),
    )
        .into_response())
}

async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> std::result::Result<Response, ApiError> {
    let tasks = state
        .engine
        .list_tasks(params.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(tasks).into_response())
}

async fn handle_get(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let task = state.engine.get_task(&task_id).await?;
    Ok(Json(task).into_response())
}

async fn handle_nodes(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    state.engine.get_task(&task_id).await?;
    let trail = state.engine.node_trail(&task_id).await?;
    Ok(Json(trail).into_response())
}

async fn handle_cancel(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let cancelled = state.engine.cancel(&task_id).await?;
    Ok(Json(serde_json::json!({ "task_id": task_id, "cancelled": cancelled })).into_response())
}

async fn handle_resume(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    state.engine.resume_task(&task_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "task_id": task_id, "status": "running" })),
    )
        .into_response())
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "discovery-engine",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}
