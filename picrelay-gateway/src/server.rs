use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::ingest::{self, EventPayload, MentionEvent, SlashCommand};
use crate::messages;
use crate::pipeline::{DispatchError, JobDispatcher};
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub in_flight: usize,
    pub max_concurrent_jobs: usize,
    pub uptime_seconds: i64,
}

/// Immediate reply to a slash command, only visible to the requester.
#[derive(Debug, Serialize)]
struct CommandResponse {
    response_type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ChallengeResponse {
    challenge: String,
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/slack/commands", post(command_handler))
        .route("/slack/events", post(events_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dispatcher = state.dispatcher();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        in_flight: dispatcher.in_flight(),
        max_concurrent_jobs: dispatcher.ceiling(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Slash command handler - POST /slack/commands
///
/// Slack only shows the response body to the requester, so validation errors
/// go there. Everything else is reported in the channel by the dispatcher.
async fn command_handler(
    State(state): State<Arc<AppState>>,
    Form(command): Form<SlashCommand>,
) -> Response {
    info!(
        command = %command.command,
        channel = %command.channel_id,
        user = %command.user_id,
        "Slash command received"
    );

    match state.dispatcher().dispatch(command.into_trigger()).await {
        Ok(ticket) => {
            debug!(job_id = %ticket.job_id, "Job dispatched");
            StatusCode::OK.into_response()
        }
        Err(DispatchError::Validation(reason)) => Json(CommandResponse {
            response_type: "ephemeral",
            text: messages::invalid_request(&reason),
        })
        .into_response(),
        Err(e) => {
            warn!("Slash command not scheduled: {}", e);
            StatusCode::OK.into_response()
        }
    }
}

/// Events API handler - POST /slack/events
///
/// Answers before any download or provider call; Slack redelivers events
/// that are not acknowledged within a few seconds.
async fn events_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EventPayload>,
) -> Response {
    match payload {
        EventPayload::UrlVerification { challenge } => {
            info!("Answering Events API URL verification");
            Json(ChallengeResponse { challenge }).into_response()
        }
        EventPayload::EventCallback { event } => {
            let Some(mention) = event.into_mention() else {
                return StatusCode::OK.into_response();
            };
            if let Some(key) = mention.trigger.idempotency_key()
                && state.dispatcher().is_duplicate(&key)
            {
                debug!(key = %key, "Duplicate event ignored");
                return StatusCode::OK.into_response();
            }

            tokio::spawn(handle_mention(Arc::clone(state.dispatcher()), mention));
            StatusCode::OK.into_response()
        }
        EventPayload::Unsupported => StatusCode::OK.into_response(),
    }
}

async fn handle_mention(dispatcher: Arc<JobDispatcher>, mention: MentionEvent) {
    let MentionEvent { mut trigger, files } = mention;
    info!(
        channel = %trigger.destination_id,
        user = %trigger.requester_id,
        attachments = files.len(),
        "Mention received"
    );

    if !files.is_empty() {
        trigger.attachments =
            ingest::fetch_attachments(dispatcher.notifier().as_ref(), &files).await;
    }

    let channel_id = trigger.destination_id.clone();
    let thread_ref = trigger.thread_ref.clone();

    match dispatcher.dispatch(trigger).await {
        Ok(ticket) => debug!(job_id = %ticket.job_id, "Job dispatched"),
        Err(DispatchError::Validation(reason)) => {
            if let Err(e) = dispatcher
                .notifier()
                .post_message(
                    &channel_id,
                    &messages::invalid_request(&reason),
                    thread_ref.as_deref(),
                )
                .await
            {
                error!("Failed to report invalid request: {}", e);
            }
        }
        Err(e) => warn!("Mention not scheduled: {}", e),
    }
}
