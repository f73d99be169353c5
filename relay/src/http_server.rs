use crate::coordinator::{TurnError, TurnOrchestrator};
use crate::webhook::{parse_webhook, InboundError, WebhookEvent, SIGNATURE_HEADER};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    orchestrator: TurnOrchestrator,
    channel_secret: Arc<str>,
}

impl AppState {
    pub fn new(orchestrator: TurnOrchestrator, channel_secret: &str) -> Self {
        Self {
            orchestrator,
            channel_secret: Arc::from(channel_secret),
        }
    }
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    BadRequest(InboundError),
    InternalError(TurnError),
}

impl From<InboundError> for ApiError {
    fn from(e: InboundError) -> Self {
        Self::BadRequest(e)
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        Self::InternalError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(e) => {
                warn!(error = %e, "Rejected webhook delivery");
                StatusCode::BAD_REQUEST.into_response()
            }
            Self::InternalError(e) => {
                error!(error = %e, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Build the router with the webhook mounted at `webhook_path`
pub fn router(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        .route("/", get(health))
        .route(webhook_path, post(handle_webhook))
        .fallback(unknown_route)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "linegpt relay is running"
}

async fn unknown_route() -> StatusCode {
    StatusCode::BAD_REQUEST
}

/// Handler for webhook deliveries
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let payload = parse_webhook(&state.channel_secret, &body, signature)?;

    // Reject the whole delivery before any side effects if an event is unusable.
    let turns = payload
        .events
        .into_iter()
        .map(WebhookEvent::into_turn)
        .filter_map(Result::transpose)
        .collect::<Result<Vec<_>, _>>()?;

    for turn in &turns {
        state.orchestrator.process_turn(turn).await?;
    }

    Ok(StatusCode::OK)
}
