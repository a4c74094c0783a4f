//! Runtime configuration.
//!
//! Everything operational comes from environment variables and is validated once
//! at startup. An optional TOML file (`BOT_CONFIG_PATH`) carries the coach
//! prompts and, optionally, a local question bank. See `BotFileConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::info;

use crate::domain::Difficulty;
use crate::error::{BotError, Result};
use crate::markup::MarkupKind;
use crate::scheduler::normalize_hhmm;
use crate::util::normalize_username;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BotFileConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub questions: Vec<QuestionCfg>,
}

/// Local bank entry. `url` defaults to the LeetCode problem page.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub slug: String,
  pub title: String,
  #[serde(default)]
  pub difficulty: Option<String>,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub prompt: Option<String>,
}

impl QuestionCfg {
  pub fn difficulty(&self) -> Difficulty {
    self.difficulty.as_deref().map(Difficulty::parse).unwrap_or_default()
  }
}

/// Prompts used by the OpenAI coach. Placeholders: `{title}`, `{difficulty}`,
/// `{url}`, `{answer}`, `{context}`, `{prompt}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub review_system: String,
  pub review_user_template: String,
  pub hint_system: String,
  pub hint_user_template: String,
  pub format_system: String,
  pub format_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      review_system: "You are a senior coding interview coach. Be precise and actionable.".into(),
      review_user_template: "Question: {title} ({difficulty})\nLink: {url}\n\nCandidate answer:\n{answer}\n\nReturn valid JSON only with keys: score (integer 1-10), feedback (string), guidance (string). Guidance must be a concrete step-by-step plan to improve and solve correctly.".into(),
      hint_system: "You are a coding interview coach. Give a nudge, never the full solution. Use short markdown sections, bullets and at most one small pseudocode block.".into(),
      hint_user_template: "Question: {title} ({difficulty})\nLink: {url}\n\nLearner context (may be empty):\n{context}\n\nGive one focused hint for the next step.".into(),
      format_system: "You reformat programming problem statements for a chat app. Keep every fact, example and constraint. Use '#' headings, '-' bullets and fenced code blocks. Output only the reformatted statement.".into(),
      format_user_template: "Problem: {title} ({difficulty})\n\n{prompt}".into(),
    }
  }
}

/// Reads and parses the TOML file at `path`.
pub fn load_bot_config(path: &Path) -> Result<BotFileConfig> {
  let raw = std::fs::read_to_string(path)
    .map_err(|e| BotError::Config(format!("read {}: {}", path.display(), e)))?;
  let cfg: BotFileConfig =
    toml::from_str(&raw).map_err(|e| BotError::Config(format!("parse {}: {}", path.display(), e)))?;
  info!(target: "leetcoach", path = %path.display(), questions = cfg.questions.len(), "Loaded bot config (TOML)");
  Ok(cfg)
}

#[derive(Clone, Debug)]
pub struct AiConfig {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub telegram_token: String,
  pub telegram_api_base: String,
  pub webhook_secret: String,
  pub cron_secret: String,
  pub allowed_usernames: Vec<String>,
  pub daily_default_time: String,
  pub daily_timezone: Tz,
  pub daily_scheduling_enabled: bool,
  pub daily_internal_ticker: bool,
  pub auto_set_webhook: bool,
  pub bot_base_url: String,
  pub question_cache: Duration,
  /// `None` when AI is disabled or no key is set.
  pub ai: Option<AiConfig>,
  pub markup: MarkupKind,
  pub topic_prompt: bool,
  pub store_snapshot_path: Option<PathBuf>,
  pub bot_config_path: Option<PathBuf>,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Builds the config from any key lookup; tests pass a map.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string());
    let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
    let required = |key: &str| match get(key) {
      Some(v) if !v.is_empty() => Ok(v),
      _ => Err(BotError::Config(format!("{} is required", key))),
    };
    let flag = |key: &str, default: bool| match get(key) {
      None => Ok(default),
      Some(v) => parse_bool(&v).ok_or_else(|| BotError::Config(format!("invalid {}: {:?}", key, v))),
    };
    let positive = |key: &str, default: u64| match get(key) {
      None => Ok(default),
      Some(v) => match v.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(BotError::Config(format!("invalid {}: {:?}", key, v))),
      },
    };

    let port = match get("PORT") {
      None => 8080,
      Some(v) => v.parse::<u16>().map_err(|_| BotError::Config(format!("invalid PORT: {:?}", v)))?,
    };

    let raw_time = get_or("DAILY_DEFAULT_TIME", "20:00");
    let daily_default_time = normalize_hhmm(&raw_time)
      .ok_or_else(|| BotError::Config(format!("invalid DAILY_DEFAULT_TIME {:?}: expected HH:MM", raw_time)))?;

    let raw_tz = get_or("DAILY_TIMEZONE", "Asia/Singapore");
    let daily_timezone = raw_tz
      .parse::<Tz>()
      .map_err(|_| BotError::Config(format!("invalid DAILY_TIMEZONE {:?}", raw_tz)))?;

    let markup = get_or("MARKUP_DIALECT", "html").parse::<MarkupKind>().map_err(BotError::Config)?;

    let ai_enabled = flag("AI_ENABLED", true)?;
    let ai_timeout = positive("AI_TIMEOUT_SEC", 25)?;
    let ai = match get("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
      Some(api_key) if ai_enabled => Some(AiConfig {
        api_key,
        base_url: get_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
        model: get_or("OPENAI_MODEL", "gpt-4o-mini"),
        timeout: Duration::from_secs(ai_timeout),
      }),
      _ => None,
    };

    Ok(Self {
      port,
      telegram_token: required("TELEGRAM_BOT_TOKEN")?,
      telegram_api_base: get_or("TELEGRAM_API_BASE", "https://api.telegram.org"),
      webhook_secret: required("WEBHOOK_SECRET")?,
      cron_secret: required("CRON_SECRET")?,
      allowed_usernames: parse_usernames(&get("ALLOWED_TELEGRAM_USERNAMES").unwrap_or_default()),
      daily_default_time,
      daily_timezone,
      daily_scheduling_enabled: flag("DAILY_SCHEDULING_ENABLED", true)?,
      daily_internal_ticker: flag("DAILY_INTERNAL_TICKER", false)?,
      auto_set_webhook: flag("AUTO_SET_WEBHOOK", false)?,
      bot_base_url: get_or("BOT_BASE_URL", ""),
      question_cache: Duration::from_secs(positive("QUESTION_CACHE_SEC", 3600)?),
      ai,
      markup,
      topic_prompt: flag("TOPIC_PROMPT", false)?,
      store_snapshot_path: get("STORE_SNAPSHOT_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
      bot_config_path: get("BOT_CONFIG_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
    })
  }

  pub fn timezone_name(&self) -> &str {
    self.daily_timezone.name()
  }
}

fn parse_bool(raw: &str) -> Option<bool> {
  match raw.to_ascii_lowercase().as_str() {
    "1" | "t" | "true" | "yes" | "on" => Some(true),
    "0" | "f" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

/// Comma separated, normalized, deduplicated, order kept.
fn parse_usernames(raw: &str) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for name in raw.split(',').map(normalize_username) {
    if !name.is_empty() && !out.contains(&name) {
      out.push(name);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("TELEGRAM_BOT_TOKEN".into(), "tok".into());
    map.insert("WEBHOOK_SECRET".into(), "hook".into());
    map.insert("CRON_SECRET".into(), "cron".into());
    for (k, v) in pairs {
      map.insert(k.to_string(), v.to_string());
    }
    move |k: &str| map.get(k).cloned()
  }

  #[test]
  fn defaults_apply() {
    let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.daily_default_time, "20:00");
    assert_eq!(cfg.timezone_name(), "Asia/Singapore");
    assert!(cfg.daily_scheduling_enabled);
    assert!(!cfg.daily_internal_ticker);
    assert_eq!(cfg.question_cache, Duration::from_secs(3600));
    assert_eq!(cfg.markup, MarkupKind::Html);
    assert!(cfg.ai.is_none());
    assert!(cfg.allowed_usernames.is_empty());
  }

  #[test]
  fn secrets_are_required() {
    let err = AppConfig::from_lookup(lookup(&[("CRON_SECRET", "  ")])).unwrap_err();
    assert!(err.to_string().contains("CRON_SECRET is required"));
  }

  #[test]
  fn time_and_zone_are_validated() {
    assert!(AppConfig::from_lookup(lookup(&[("DAILY_DEFAULT_TIME", "25:00")])).is_err());
    assert!(AppConfig::from_lookup(lookup(&[("DAILY_TIMEZONE", "Nowhere/City")])).is_err());
    let cfg = AppConfig::from_lookup(lookup(&[("DAILY_DEFAULT_TIME", "7")])).unwrap();
    assert_eq!(cfg.daily_default_time, "07:00");
  }

  #[test]
  fn ai_needs_key_and_flag() {
    let cfg = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-1")])).unwrap();
    let ai = cfg.ai.unwrap();
    assert_eq!(ai.model, "gpt-4o-mini");
    assert_eq!(ai.timeout, Duration::from_secs(25));
    let off = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-1"), ("AI_ENABLED", "false")])).unwrap();
    assert!(off.ai.is_none());
    assert!(AppConfig::from_lookup(lookup(&[("AI_ENABLED", "maybe")])).is_err());
  }

  #[test]
  fn usernames_are_normalized_and_deduplicated() {
    let cfg = AppConfig::from_lookup(lookup(&[("ALLOWED_TELEGRAM_USERNAMES", "@Alice, bob ,ALICE,,")])).unwrap();
    assert_eq!(cfg.allowed_usernames, vec!["alice".to_string(), "bob".to_string()]);
  }

  #[test]
  fn markup_dialect_parses() {
    let cfg = AppConfig::from_lookup(lookup(&[("MARKUP_DIALECT", "MarkdownV2")])).unwrap();
    assert_eq!(cfg.markup, MarkupKind::MarkdownV2);
    assert!(AppConfig::from_lookup(lookup(&[("MARKUP_DIALECT", "bbcode")])).is_err());
  }

  #[test]
  fn toml_file_parses_prompts_and_questions() {
    let raw = r#"
      [prompts]
      hint_system = "Be brief."

      [[questions]]
      slug = "two-sum"
      title = "Two Sum"
      difficulty = "easy"
      prompt = "Find two numbers."
    "#;
    let cfg: BotFileConfig = toml::from_str(raw).unwrap();
    assert_eq!(cfg.prompts.hint_system, "Be brief.");
    assert!(cfg.prompts.review_user_template.contains("{answer}"));
    assert_eq!(cfg.questions[0].difficulty(), Difficulty::Easy);
  }
}
