use crate::config::ProxyConfig;
use crate::deployment::DeploymentResolver;
use crate::error::Result;
use crate::logging::SharedLogger;
use crate::proxy::{InboundRequest, Pipeline};
use crate::translate::openai_types::ChatErrorResponse;
use crate::transport;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub logger: SharedLogger,
}

impl AppState {
    /// Build the shared state: deployment table, outbound client, pipeline.
    pub fn from_config(config: &ProxyConfig, logger: SharedLogger) -> Result<Self> {
        let client = transport::build_client(&config.transport)?;
        let pipeline = Pipeline::new(
            DeploymentResolver::from_config(config),
            client,
            config.completion.clone(),
            logger.clone(),
        );
        Ok(Self { pipeline, logger })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", any(handle_chat_completions))
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .fallback(handle_not_found)
        .layer(middleware::from_fn(answer_preflight))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `OPTIONS` on any path is answered here and never reaches a handler.
async fn answer_preflight(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return preflight_response();
    }
    next.run(req).await
}

fn preflight_response() -> Response {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS, POST"),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                "Authorization, Content-Type, x-requested-with",
            ),
        ],
    )
        .into_response()
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let inbound = InboundRequest {
        uri: uri.to_string(),
        headers,
        body,
    };

    match state.pipeline.handle(&inbound).await {
        Ok(resp) => resp.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, status = e.status().as_u16(), "request failed");
            state.logger.error("server", format!("Proxy error: {}", e));
            e.into_response()
        }
    }
}

async fn handle_not_found(uri: Uri) -> Response {
    let err = ChatErrorResponse::new(
        "invalid_request_error",
        "not_found",
        format!("no route for {}", uri.path()),
    );
    (StatusCode::NOT_FOUND, Json(err)).into_response()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models: Vec<serde_json::Value> = state
        .pipeline
        .resolver()
        .models()
        .into_iter()
        .map(|name| {
            serde_json::json!({
                "id": name,
                "object": "model",
                "owned_by": "google",
            })
        })
        .collect();

    Json(serde_json::json!({ "data": models, "object": "list" }))
}
