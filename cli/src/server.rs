// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP/SSE surface of one agency
//!
//! Routes:
//! - `POST /api/agency/get_response_stream` - SSE stream of run events
//! - `POST /api/agency/get_response` - buffered final answer
//! - `POST /api/agency/cancel` - cancel a run (default mode: immediate)
//! - `GET  /api/agency/conversations/{id}/messages` - full transcript
//! - `GET  /api/agency/structure` - chart export
//! - `GET  /health`
//! - `GET  /health/providers` - probes every completion provider
//!
//! A client that goes away drops the SSE body, which drops the run stream
//! and disconnects the run.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use switchboard_core::application::{RunError, RunRequest};
use switchboard_core::domain::message::{ConversationId, RunId};
use switchboard_core::domain::run::CancelMode;
use switchboard_swarm::Agency;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct AppState {
    pub agency: Arc<Agency>,
    pub start_time: Instant,
}

/// Body of both `get_response` endpoints.
#[derive(Debug, Deserialize)]
pub struct AgencyRequest {
    pub message: String,
    /// Entry-point agent; the chart's first entry point when absent
    #[serde(default)]
    pub recipient_agent: Option<String>,
    /// Conversation to continue; a new one is started when absent
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Opaque application data handed to every tool call
    #[serde(default)]
    pub app_context: Option<Value>,
}

impl From<AgencyRequest> for RunRequest {
    fn from(body: AgencyRequest) -> Self {
        let mut request = RunRequest::new(body.message);
        if let Some(agent) = body.recipient_agent {
            request = request.recipient(agent);
        }
        if let Some(conversation_id) = body.conversation_id {
            request = request.conversation(conversation_id);
        }
        if let Some(context) = body.app_context {
            request = request.app_context(context);
        }
        request
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub run_id: String,
    #[serde(default)]
    pub cancel_mode: Option<CancelMode>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Run(RunError::UnknownAgent(_)) | ApiError::Run(RunError::NotEntryPoint(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Run(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn app(agency: Arc<Agency>) -> Router {
    let state = Arc::new(AppState {
        agency,
        start_time: Instant::now(),
    });

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/providers", get(provider_health_handler))
        .route("/api/agency/get_response_stream", post(get_response_stream_handler))
        .route("/api/agency/get_response", post(get_response_handler))
        .route("/api/agency/cancel", post(cancel_handler))
        .route(
            "/api/agency/conversations/{conversation_id}/messages",
            get(messages_handler),
        )
        .route("/api/agency/structure", get(structure_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `agency` until Ctrl+C or SIGTERM.
pub async fn serve(agency: Arc<Agency>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(agency = agency.name(), "Listening on {}", addr);

    axum::serve(listener, app(agency))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutting down");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "agency": state.agency.name(),
        "active_runs": state.agency.active_runs().len(),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn provider_health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.agency.provider_health().await {
        Ok(()) => Json(json!({ "status": "healthy" })).into_response(),
        Err(e) => {
            warn!("Provider health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn get_response_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AgencyRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let stream = state.agency.get_response_stream(body.into()).await?;
    info!(run_id = %stream.run_id(), "Streaming run over SSE");
    let events = stream.map(|event| Ok::<_, Infallible>(Event::default().data(event.sse_data())));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn get_response_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AgencyRequest>,
) -> Result<Json<Value>, ApiError> {
    let answer = state.agency.get_response(body.into()).await?;
    Ok(Json(json!({
        "run_id": answer.run_id,
        "conversation_id": answer.conversation_id,
        "response": answer.response,
        "succeeded": answer.succeeded,
    })))
}

async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CancelRequest>,
) -> Result<Response, ApiError> {
    let run_id = RunId::parse(&body.run_id)
        .map_err(|e| ApiError::BadRequest(format!("invalid run_id '{}': {}", body.run_id, e)))?;

    match state.agency.cancel(run_id, body.cancel_mode) {
        Some(outcome) => Ok(Json(outcome).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "run_id": run_id,
                "status": "unknown",
                "cancelled": false,
                "new_messages": [],
            })),
        )
            .into_response()),
    }
}

async fn messages_handler(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<Value> {
    let conversation_id = ConversationId::from(conversation_id);
    let messages = state.agency.transcript(&conversation_id).await;
    Json(json!({
        "conversation_id": conversation_id,
        "messages": messages,
    }))
}

async fn structure_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "agency": state.agency.name(),
        "entry_points": state.agency.entry_points(),
        "structure": state.agency.structure(),
    }))
}
