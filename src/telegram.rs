//! Telegram Bot API client: `sendMessage` and `setWebhook` over JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::ConversationId;
use crate::error::{BotError, Result};
use crate::ports::Transport;
use crate::protocol::{ApiResponse, SendMessage, SetWebhook};
use crate::util::trunc_for_log;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const UA: &str = "leetcoach-backend/0.1";

#[derive(Clone)]
pub struct TelegramClient {
  client: reqwest::Client,
  base_url: String,
  parse_mode: &'static str,
}

impl TelegramClient {
  /// `api_base` is e.g. `https://api.telegram.org`; `parse_mode` is used for rich sends.
  pub fn new(api_base: &str, token: &str, parse_mode: &'static str) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(HTTP_TIMEOUT)
      .build()
      .map_err(|e| BotError::Config(format!("telegram client: {}", e)))?;
    let base_url = format!("{}/bot{}", api_base.trim_end_matches('/'), token);
    Ok(Self { client, base_url, parse_mode })
  }

  #[instrument(level = "info", skip(self, webhook_url))]
  pub async fn set_webhook(&self, webhook_url: &str) -> Result<()> {
    self.post_json("/setWebhook", &SetWebhook { url: webhook_url }).await?;
    info!(target: "leetcoach", "Telegram webhook registered");
    Ok(())
  }

  async fn post_json<T: Serialize + ?Sized>(&self, method: &str, payload: &T) -> Result<()> {
    let url = format!("{}{}", self.base_url, method);
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .json(payload)
      .send()
      .await
      .map_err(|e| BotError::Transport(format!("telegram request failed: {}", e.without_url())))?;

    let status = res.status();
    let body = res
      .text()
      .await
      .map_err(|e| BotError::Transport(format!("read telegram response: {}", e.without_url())))?;
    if !status.is_success() {
      return Err(BotError::Transport(format!("telegram status {}: {}", status.as_u16(), trunc_for_log(&body, 300))));
    }

    let out: ApiResponse = serde_json::from_str(&body)
      .map_err(|e| BotError::Transport(format!("unmarshal telegram response: {}", e)))?;
    if !out.ok {
      return Err(BotError::Transport(format!("telegram api error: {}", out.description)));
    }
    Ok(())
  }
}

#[async_trait]
impl Transport for TelegramClient {
  async fn send(&self, conversation: ConversationId, text: &str) -> Result<()> {
    debug!(target: "leetcoach", conversation, len = text.len(), "sendMessage (plain)");
    let body = SendMessage { chat_id: conversation, text, parse_mode: None, disable_web_page_preview: false };
    self.post_json("/sendMessage", &body).await
  }

  async fn send_rich(&self, conversation: ConversationId, markup: &str) -> Result<()> {
    debug!(target: "leetcoach", conversation, len = markup.len(), parse_mode = self.parse_mode, "sendMessage (rich)");
    let body = SendMessage {
      chat_id: conversation,
      text: markup,
      parse_mode: Some(self.parse_mode),
      disable_web_page_preview: true,
    };
    self.post_json("/sendMessage", &body).await
  }
}

/// `<base>/webhook/<secret>`; any path on `base` is replaced.
pub fn build_webhook_url(base: &str, secret: &str) -> Result<String> {
  let base = base.trim();
  if base.is_empty() {
    return Err(BotError::Config("BOT_BASE_URL is empty".into()));
  }
  let (scheme, rest) = base
    .split_once("://")
    .filter(|(s, _)| *s == "http" || *s == "https")
    .ok_or_else(|| BotError::Config(format!("invalid BOT_BASE_URL: {}", base)))?;
  let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
  if host.is_empty() {
    return Err(BotError::Config(format!("invalid BOT_BASE_URL: {}", base)));
  }
  Ok(format!("{}://{}/webhook/{}", scheme, host, secret))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn webhook_url_replaces_path() {
    assert_eq!(build_webhook_url("https://bot.example.com", "s3").unwrap(), "https://bot.example.com/webhook/s3");
    assert_eq!(
      build_webhook_url("https://bot.example.com:8443/old/path/?x=1", "s3").unwrap(),
      "https://bot.example.com:8443/webhook/s3"
    );
  }

  #[test]
  fn webhook_url_rejects_bad_bases() {
    assert!(build_webhook_url("", "s").is_err());
    assert!(build_webhook_url("ftp://host", "s").is_err());
    assert!(build_webhook_url("https://", "s").is_err());
  }

  #[test]
  fn base_url_embeds_token() {
    let c = TelegramClient::new("https://api.telegram.org/", "123:abc", "HTML").unwrap();
    assert_eq!(c.base_url, "https://api.telegram.org/bot123:abc");
  }
}
