//! Router construction and the non-streaming endpoints

use std::collections::HashSet;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{Event, ServerConfig};
use dispatcher::{MetricsSnapshot, RoutingSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument};

use crate::encoder;
use crate::error::ApiError;
use crate::handler::stream_channel;
use crate::state::AppState;

/// Body of `POST /publish`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishRequest {
    pub channels: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub id: String,
    pub channels: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub routing: RoutingSnapshot,
    pub metrics: MetricsSnapshot,
}

/// Path pattern for the streaming endpoint under `prefix`
fn stream_route(prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    format!("{prefix}/:channel")
}

/// Build the full router
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/publish", post(publish))
        .route(&stream_route(&config.route_prefix), get(stream_channel))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.allow_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.dispatcher().is_closed() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "closed" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    }
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let routing = state.dispatcher().snapshot().await?;
    Ok(Json(StatsResponse {
        routing,
        metrics: state.dispatcher().metrics(),
    }))
}

#[instrument(name = "http_publish", skip_all, fields(id = %request.id))]
async fn publish(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.channels.is_empty() {
        return Err(ApiError::BadRequest("channels must not be empty".into()));
    }

    let mut event = Event::new(request.id, request.data);
    if let Some(name) = request.event {
        event = event.with_event(name);
    }
    encoder::validate(&event)?;

    let mut seen = HashSet::new();
    let channels: Vec<String> = request
        .channels
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect();

    if state.dispatcher().is_closed() {
        return Err(ApiError::Unavailable);
    }

    // History first, then routing. A subscriber registered before the publish
    // is routed gets the live copy (deduplicated against its replay); one
    // registered after it finds the event in history. Only a shutdown landing
    // between the two steps leaves an appended event behind a 503, and no
    // subscriber can attach after that.
    for channel in &channels {
        if let Some(history) = state.history(channel) {
            history.append(channel, event.clone());
        }
    }

    let id = event.id.clone();
    let count = channels.len();
    state.dispatcher().publish(channels, event).await?;
    debug!(channels = count, "Event published");

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            id,
            channels: count,
        }),
    ))
}
