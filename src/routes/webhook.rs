//! Telegram webhook endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, error, instrument, warn};

use crate::protocol::Update;
use crate::state::AppState;

/// Secret mismatch is 403, an undecodable body 400. Handling errors are logged
/// and still answered with 200 so Telegram does not redeliver.
#[instrument(level = "info", skip_all, fields(body_len = body.len()))]
pub async fn receive_update(
    State(state): State<Arc<AppState>>,
    Path(secret): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    if secret != state.webhook_secret {
        warn!(target: "leetcoach", "Webhook called with wrong secret");
        return (StatusCode::FORBIDDEN, "forbidden");
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!(target: "leetcoach", error = %e, "Invalid webhook payload");
            return (StatusCode::BAD_REQUEST, "invalid payload");
        }
    };

    match &update.message {
        Some(message) => {
            if let Err(e) = state.router.handle_message(message).await {
                error!(target: "leetcoach", update_id = update.update_id, conversation = message.chat.id, error = %e, "Handle message failed");
            }
        }
        None => debug!(target: "leetcoach", update_id = update.update_id, "Update without message ignored"),
    }
    (StatusCode::OK, "")
}
