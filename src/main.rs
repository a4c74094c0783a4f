//! LeetCoach · Telegram LeetCode practice bot
//!
//! - Axum HTTP server: Telegram webhook, daily cron trigger, health check
//! - Optional OpenAI coach (via environment variables)
//!
//! Important env variables:
//!   TELEGRAM_BOT_TOKEN, WEBHOOK_SECRET, CRON_SECRET : required
//!   PORT                       : u16 (default 8080)
//!   ALLOWED_TELEGRAM_USERNAMES : comma separated allow-list (empty = everyone)
//!   DAILY_DEFAULT_TIME         : HH:MM (default 20:00)
//!   DAILY_TIMEZONE             : IANA zone (default Asia/Singapore)
//!   DAILY_INTERNAL_TICKER      : run the daily dispatch in-process every minute
//!   AUTO_SET_WEBHOOK, BOT_BASE_URL : register the webhook on startup
//!   AI_ENABLED, OPENAI_API_KEY, OPENAI_MODEL, OPENAI_BASE_URL : coach
//!   MARKUP_DIALECT             : "html" (default) or "markdown_v2"
//!   BOT_CONFIG_PATH            : TOML with prompts and an optional local question bank
//!   STORE_SNAPSHOT_PATH        : JSON file the store persists to
//!   LOG_LEVEL, LOG_FORMAT      : tracing filter / "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use leetcoach::config::AppConfig;
use leetcoach::routes::build_router;
use leetcoach::scheduler::TICK_PERIOD;
use leetcoach::state::AppState;
use leetcoach::telegram::{build_webhook_url, TelegramClient};
use leetcoach::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      error!(target: "leetcoach", error = %e, "Invalid configuration");
      std::process::exit(1);
    }
  };

  let renderer_mode = leetcoach::markup::Renderer::new(cfg.markup).parse_mode();
  let telegram = Arc::new(TelegramClient::new(&cfg.telegram_api_base, &cfg.telegram_token, renderer_mode)?);
  let state = Arc::new(AppState::build(&cfg, telegram.clone()).await?);

  if cfg.auto_set_webhook {
    auto_set_webhook(&telegram, &cfg.bot_base_url, &cfg.webhook_secret).await;
  }

  // Warm the question list so the first /lc does not pay for the fetch.
  let bank = state.router.service().bank().clone();
  tokio::spawn(async move {
    match bank.all().await {
      Ok(all) => info!(target: "leetcoach", questions = all.len(), "Question bank warmed up"),
      Err(e) => warn!(target: "leetcoach", error = %e, "Question bank warm-up failed"),
    }
  });

  let ticker = (cfg.daily_scheduling_enabled && cfg.daily_internal_ticker)
    .then(|| state.dispatcher.clone().spawn_ticker(TICK_PERIOD));

  let app = build_router(state.clone());
  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "leetcoach", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

  if let Some(handle) = ticker {
    handle.abort();
  }
  info!(target: "leetcoach", "Shutdown complete");
  Ok(())
}

async fn auto_set_webhook(telegram: &TelegramClient, base_url: &str, secret: &str) {
  if base_url.trim().is_empty() {
    warn!(target: "leetcoach", "AUTO_SET_WEBHOOK is on but BOT_BASE_URL is empty; skipping");
    return;
  }
  let url = match build_webhook_url(base_url, secret) {
    Ok(url) => url,
    Err(e) => {
      warn!(target: "leetcoach", error = %e, "Could not build webhook URL");
      return;
    }
  };
  if let Err(e) = telegram.set_webhook(&url).await {
    warn!(target: "leetcoach", error = %e, "setWebhook failed");
  }
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!(target: "leetcoach", error = %e, "Could not listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        error!(target: "leetcoach", error = %e, "Could not listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!(target: "leetcoach", "Shutdown signal received");
}
