//! HTTP surface: one chat endpoint that returns mixed text/graph parts, and
//! one retrieval endpoint for rendered images. Thin plumbing around the
//! generation pipeline; no pipeline logic lives here.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::ChatAgent;
use crate::errors::GraphError;
use crate::generator::GraphGenerator;
use crate::models::{BotResponse, GraphRequest, MessagePart, PartKind};
use crate::parser::parse_response;
use crate::store::ArtifactStore;

pub struct AppState {
    pub chat: Arc<dyn ChatAgent>,
    pub generator: GraphGenerator,
    pub store: ArtifactStore,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate_response", post(generate_response))
        .route("/generated_graphs/:file", get(get_graph_image))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

pub async fn generate_response(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> (StatusCode, Json<BotResponse>) {
    let req_id = Uuid::new_v4();
    info!("request {req_id}: received new query");

    let query = payload.query.trim();
    if query.is_empty() {
        warn!("request {req_id}: missing query parameter");
        return (
            StatusCode::BAD_REQUEST,
            Json(BotResponse {
                success: false,
                messages: Vec::new(),
                error: Some("Query parameter is missing".to_string()),
            }),
        );
    }

    let reply = match state.chat.reply(query).await {
        Ok(reply) => reply,
        Err(err) => {
            error!("request {req_id}: chat agent failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BotResponse {
                    success: false,
                    messages: vec![MessagePart::text(format!(
                        "Error processing request: {err}"
                    ))],
                    error: Some(err.to_string()),
                }),
            );
        }
    };

    let mut messages = Vec::new();
    for (idx, part) in parse_response(&reply).into_iter().enumerate() {
        match part.kind {
            PartKind::Text => messages.push(part),
            PartKind::Graph => {
                info!("request {req_id}: generating graph for part {idx}");
                let result = state
                    .generator
                    .generate_graph(&GraphRequest::new(part.content))
                    .await;
                if result.success {
                    messages.push(MessagePart::graph(result.image_id));
                } else {
                    let message = format!(
                        "Failed to generate graph: {}",
                        result.error.unwrap_or_else(|| "unknown error".to_string())
                    );
                    error!("request {req_id}: {message}");
                    messages.push(MessagePart::text(message));
                }
            }
        }
    }

    info!("request {req_id}: done");
    (
        StatusCode::OK,
        Json(BotResponse {
            success: true,
            messages,
            error: None,
        }),
    )
}

pub async fn get_graph_image(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> axum::response::Response {
    let image_id = file.strip_suffix(".png").unwrap_or(&file);
    match state.store.load(image_id).await {
        Ok(bytes) => {
            info!("serving graph image {image_id}");
            ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
        }
        Err(GraphError::ImageNotFound(_)) => {
            warn!("graph image not found: {image_id}");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Image not found"})),
            )
                .into_response()
        }
        Err(err) => {
            error!("error serving graph image {image_id}: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}
