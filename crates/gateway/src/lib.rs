//! HTTP gateway for WorkLoom.
//!
//! Exposes REST endpoints for triggering workflows, polling job status,
//! and tailing a workflow's event trail over SSE.
//!
//! Built on Axum for high performance async HTTP.

pub mod stream;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tracing::info;

use workloom_bus::SharedBus;
use workloom_core::error::{BusError, QueueError};
use workloom_core::job::JobStatus;
use workloom_queue::QueueEngine;

use stream::{relay_events, StreamFrame};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub bus: SharedBus,
    pub engine: Arc<QueueEngine>,
    /// The queue workflow trigger jobs are enqueued on.
    pub queue_name: String,
    /// Per-connection SSE buffer depth.
    pub event_buffer: usize,
    /// Close an event stream after this long with no events.
    pub idle_timeout: Duration,
}

pub type SharedGatewayState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedGatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/workflows", post(trigger_workflow_handler))
        .route("/v1/jobs/{queue}/{job_id}", get(job_status_handler))
        .route("/v1/workflows/{id}/events", get(event_stream_handler))
        .route("/v1/workflows/{id}/events", delete(purge_events_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server. Runs until the listener fails.
pub async fn serve(
    config: &workloom_config::GatewayConfig,
    state: SharedGatewayState,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, build_router(state)).await
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct TriggerWorkflowRequest {
    /// Omit to have the gateway mint a fresh workflow id.
    #[serde(default)]
    workflow_id: Option<String>,
    /// The user prompt the agent run starts from.
    prompt: String,
}

#[derive(Serialize, Deserialize)]
struct TriggerWorkflowResponse {
    workflow_id: String,
    job_id: String,
    queue: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /v1/workflows` — enqueue an agent run.
///
/// The workflow id doubles as the job's idempotency key, so re-posting the
/// same id while the run is live returns the same job instead of forking a
/// second run.
async fn trigger_workflow_handler(
    State(state): State<SharedGatewayState>,
    Json(payload): Json<TriggerWorkflowRequest>,
) -> Result<(StatusCode, Json<TriggerWorkflowResponse>), (StatusCode, Json<ErrorResponse>)> {
    if payload.prompt.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "prompt must not be empty".into(),
            }),
        ));
    }

    let workflow_id = payload
        .workflow_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let job_id = state
        .engine
        .enqueue(
            &state.queue_name,
            workflow_id.clone(),
            serde_json::json!({
                "workflow_id": workflow_id,
                "prompt": payload.prompt,
            }),
        )
        .await
        .map_err(queue_error_response)?;

    info!(workflow_id = %workflow_id, queue = %state.queue_name, "Workflow triggered");
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerWorkflowResponse {
            workflow_id,
            job_id,
            queue: state.queue_name.clone(),
        }),
    ))
}

/// `GET /v1/jobs/{queue}/{job_id}` — poll a job's status.
async fn job_status_handler(
    State(state): State<SharedGatewayState>,
    Path((queue, job_id)): Path<(String, String)>,
) -> Result<Json<JobStatus>, (StatusCode, Json<ErrorResponse>)> {
    state
        .engine
        .status(&queue, &job_id)
        .await
        .map(Json)
        .map_err(queue_error_response)
}

/// `GET /v1/workflows/{id}/events` — SSE stream of a workflow's events.
///
/// Replays every event published so far, then tails live ones. A consumer
/// that falls more than the configured buffer behind receives a final
/// `error` event and the stream closes; the workflow itself is unaffected.
/// A purged workflow's stream is `410 Gone`, not an empty feed.
async fn event_stream_handler(
    State(state): State<SharedGatewayState>,
    Path(id): Path<String>,
) -> Result<
    Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>,
    (StatusCode, Json<ErrorResponse>),
> {
    let subscription = match state.bus.subscribe(&id).await {
        Ok(subscription) => subscription,
        Err(BusError::StaleCleanup(id)) => {
            return Err((
                StatusCode::GONE,
                Json(ErrorResponse {
                    error: format!("events for workflow '{id}' were purged"),
                }),
            ));
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ));
        }
    };
    let (tx, rx) = mpsc::channel(state.event_buffer);
    tokio::spawn(relay_events(subscription, tx, state.idle_timeout));

    let stream = ReceiverStream::new(rx).map(|frame| {
        Ok(match frame {
            StreamFrame::Event(event) => {
                let data = serde_json::to_string(&event).unwrap_or_default();
                SseEvent::default().event(event.event_name()).data(data)
            }
            StreamFrame::Overflow => SseEvent::default().event("error").data(
                serde_json::json!({
                    "error": "event buffer overflow, closing stream"
                })
                .to_string(),
            ),
        })
    });

    Ok(Sse::new(stream))
}

/// `DELETE /v1/workflows/{id}/events` — purge a finished workflow's log.
async fn purge_events_handler(
    State(state): State<SharedGatewayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    match state.bus.cleanup(&id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(BusError::UnknownWorkflow(id)) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown workflow '{id}'"),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

fn queue_error_response(e: QueueError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        QueueError::UnknownQueue(_) | QueueError::UnknownJob { .. } => StatusCode::NOT_FOUND,
        QueueError::ShuttingDown(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}
