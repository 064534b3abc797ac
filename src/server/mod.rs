//! HTTP transport: one POST endpoint per bot mount path, plus `/health`.

pub mod protocol;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{MatchedPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::bot::Bot;
use crate::command::WELCOME_MESSAGE;
use crate::error::GatewayError;
use crate::registry::BotRegistry;

use protocol::{sse_events, PoeRequest, SettingsResponse};

/// Errors answered before a request reaches a bot.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid access key")]
    Unauthorized,
    #[error("no bot mounted at {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router for every bot in `registry`.
pub fn router(registry: Arc<BotRegistry>) -> Router {
    let mut app = Router::new().route("/health", get(health_handler));
    for (mount, _) in registry.iter() {
        app = app.route(mount, post(bot_handler));
    }
    app.layer(TraceLayer::new_for_http()).with_state(registry)
}

/// Serve `registry` on `host:port` until Ctrl-C.
pub async fn serve(registry: Arc<BotRegistry>, host: &str, port: u16) -> Result<(), GatewayError> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    for (mount, bot) in registry.iter() {
        info!(bot = bot.name(), mount, "mounted bot");
    }
    info!(addr = %listener.local_addr()?, bots = registry.len(), "gateway listening");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}

async fn health_handler(State(registry): State<Arc<BotRegistry>>) -> impl IntoResponse {
    let bots: Vec<_> = registry
        .iter()
        .map(|(mount, bot)| serde_json::json!({ "name": bot.name(), "path": mount }))
        .collect();
    Json(serde_json::json!({ "status": "ok", "bots": bots }))
}

async fn bot_handler(
    State(registry): State<Arc<BotRegistry>>,
    matched: MatchedPath,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServerError> {
    let bot = registry
        .get(matched.as_str())
        .cloned()
        .ok_or_else(|| ServerError::NotFound(matched.as_str().to_string()))?;

    check_access(&headers, bot.config().access_key.as_deref())?;

    let request: PoeRequest =
        serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    Ok(dispatch(&bot, request))
}

fn dispatch(bot: &Bot, request: PoeRequest) -> Response {
    match request {
        PoeRequest::Query(query) => {
            let events = sse_events(bot.respond(&query));
            Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        PoeRequest::Settings(_) => Json(SettingsResponse::new(WELCOME_MESSAGE)).into_response(),
        PoeRequest::ReportFeedback(feedback) => {
            info!(
                parent: bot.span(),
                message_id = %feedback.message_id,
                user_id = %feedback.user_id,
                feedback_type = %feedback.feedback_type,
                "feedback reported"
            );
            Json(serde_json::json!({})).into_response()
        }
        PoeRequest::ReportError(report) => {
            error!(
                parent: bot.span(),
                report = %report.message,
                metadata = %report.metadata,
                "client reported error"
            );
            Json(serde_json::json!({})).into_response()
        }
    }
}

/// Require `Authorization: Bearer <key>` when the bot has an access key.
fn check_access(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ServerError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(key) if key == expected => Ok(()),
        _ => Err(ServerError::Unauthorized),
    }
}
