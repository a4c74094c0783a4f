//! Router assembly: health check, Telegram webhook, daily cron trigger, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::state::AppState;

pub mod cron;
pub mod webhook;

/// Build the application router with:
/// - `GET /healthz`
/// - `POST /webhook/:secret` for Telegram updates
/// - `POST /cron/daily` for the external scheduler (header `X-Cron-Secret`)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
///
/// The webhook path carries a secret, so request spans log the matched route only.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/webhook/:secret", post(webhook::receive_update))
        .route("/cron/daily", post(cron::run_daily))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    |req: &axum::http::Request<axum::body::Body>| {
                        let route = req
                            .extensions()
                            .get::<axum::extract::MatchedPath>()
                            .map(|p| p.as_str().to_owned())
                            .unwrap_or_default();
                        tracing::info_span!("request", method = %req.method(), %route)
                    },
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn healthz() -> &'static str {
    "ok"
}
