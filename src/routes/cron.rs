//! Daily dispatch trigger for an external scheduler.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{error, instrument, warn};

use crate::state::AppState;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

#[instrument(level = "info", skip_all)]
pub async fn run_daily(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided.is_empty() || provided != state.cron_secret {
        warn!(target: "daily", "Cron called without a valid secret");
        return (StatusCode::UNAUTHORIZED, "unauthorized".to_string());
    }
    if !state.daily_scheduling_enabled {
        return (StatusCode::OK, "daily scheduling is off".to_string());
    }

    let now = state.router.service().clock().now();
    match state.dispatcher.run(now).await {
        Ok(report) => (StatusCode::OK, format!("processed={} sent={}", report.processed, report.sent)),
        Err(e) => {
            error!(target: "daily", error = %e, "Could not list daily-enabled conversations");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to load chats".to_string())
        }
    }
}
