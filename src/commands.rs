//! Chat command parsing and inbound message routing.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::ConversationId;
use crate::error::{BotError, Result};
use crate::messages;
use crate::protocol::Message;
use crate::scheduler::normalize_hhmm;
use crate::session::PracticeService;
use crate::store::MAX_ANSWERED_LIMIT;
use crate::util::{normalize_slug, normalize_username};

const USAGE_DELETE: &str = "Usage: /delete <slug>, e.g. /delete two-sum";
const USAGE_ANSWERED: &str = "Usage: /answered [limit], e.g. /answered 10";
const USAGE_REVISE: &str = "Usage: /revise <slug>, e.g. /revise two-sum";
const USAGE_DAILY_TIME: &str = "Usage: /daily_time HH:MM (24h), e.g. /daily_time 21:00";
const INVALID_DAILY_ON: &str = "Invalid time. Use 24h HH:MM, e.g. /daily_on 20:30";
const INVALID_DAILY_TIME: &str = "Invalid time. Use 24h HH:MM, e.g. /daily_time 21:00";

/// A parsed, validated command. Slugs and times are already normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
  Help,
  Question { topic: String },
  Hint { context: String },
  Done,
  Skip,
  Exit,
  Delete { slug: String },
  Answered { limit: usize },
  Revise { slug: Option<String> },
  DailyOn { time: Option<String> },
  DailyOff,
  DailyTime { time: String },
  DailyStatus,
  Unknown(String),
}

/// Strips an `@botname` suffix and lowercases.
pub fn normalize_command(token: &str) -> String {
  let name = token.split('@').next().unwrap_or(token);
  name.to_lowercase()
}

/// `1..=max`, anything else is rejected.
pub fn parse_positive_limit(raw: &str, max: usize) -> Option<usize> {
  match raw.trim().parse::<usize>() {
    Ok(n) if n >= 1 && n <= max => Some(n),
    _ => None,
  }
}

impl Command {
  /// Parses a `/command args…` line. `BotError::Validation` carries the usage
  /// text to send back; nothing has been changed at that point.
  pub fn parse(text: &str) -> Result<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let first = args.first().copied();
    let rest = args.join(" ");

    let cmd = match normalize_command(head).as_str() {
      "/start" | "/help" => Command::Help,
      "/lc" => Command::Question { topic: rest },
      "/hint" => Command::Hint { context: rest },
      "/done" => Command::Done,
      "/skip" => Command::Skip,
      "/exit" => Command::Exit,
      "/delete" | "/unrevise" => {
        let slug = first.map(normalize_slug).unwrap_or_default();
        if slug.is_empty() {
          return Err(BotError::Validation(USAGE_DELETE.into()));
        }
        Command::Delete { slug }
      }
      "/answered" | "/history" => match first {
        None => Command::Answered { limit: 0 },
        Some(raw) => match parse_positive_limit(raw, MAX_ANSWERED_LIMIT) {
          Some(limit) => Command::Answered { limit },
          None => return Err(BotError::Validation(USAGE_ANSWERED.into())),
        },
      },
      "/revise" => match first {
        None => Command::Revise { slug: None },
        Some(raw) => match normalize_slug(raw) {
          s if s.is_empty() => return Err(BotError::Validation(USAGE_REVISE.into())),
          s => Command::Revise { slug: Some(s) },
        },
      },
      "/daily_on" => match first {
        None => Command::DailyOn { time: None },
        Some(raw) => match normalize_hhmm(raw) {
          Some(t) => Command::DailyOn { time: Some(t) },
          None => return Err(BotError::Validation(INVALID_DAILY_ON.into())),
        },
      },
      "/daily_off" => Command::DailyOff,
      "/daily_time" => match first {
        None => return Err(BotError::Validation(USAGE_DAILY_TIME.into())),
        Some(raw) => match normalize_hhmm(raw) {
          Some(time) => Command::DailyTime { time },
          None => return Err(BotError::Validation(INVALID_DAILY_TIME.into())),
        },
      },
      "/daily_status" => Command::DailyStatus,
      other => Command::Unknown(other.to_string()),
    };
    Ok(cmd)
  }
}

/// Entry point for inbound chat messages: allow-list, then command or free text.
pub struct Router {
  service: Arc<PracticeService>,
  allowed: HashSet<String>,
}

impl Router {
  /// An empty allow-list admits everyone.
  pub fn new(service: Arc<PracticeService>, allowed_usernames: &[String]) -> Self {
    let allowed = allowed_usernames
      .iter()
      .map(|u| normalize_username(u))
      .filter(|u| !u.is_empty())
      .collect();
    Self { service, allowed }
  }

  pub fn service(&self) -> &Arc<PracticeService> {
    &self.service
  }

  pub fn is_allowed(&self, username: &str) -> bool {
    if self.allowed.is_empty() {
      return true;
    }
    let normalized = normalize_username(username);
    !normalized.is_empty() && self.allowed.contains(&normalized)
  }

  #[instrument(level = "info", skip_all, fields(conversation = message.chat.id))]
  pub async fn handle_message(&self, message: &Message) -> Result<()> {
    let conversation = message.chat.id;
    if !self.is_allowed(&message.from.username) {
      warn!(target: "leetcoach", conversation, username = %message.from.username, "Blocked message from unauthorized username");
      return self.service.reply(conversation, messages::NOT_ALLOWED).await;
    }

    let text = message.text.trim();
    if text.is_empty() {
      return Ok(());
    }
    if !text.starts_with('/') {
      return self.service.submit_free_text(conversation, text).await;
    }

    match Command::parse(text) {
      Ok(cmd) => self.dispatch(conversation, cmd).await,
      Err(BotError::Validation(usage)) => self.service.reply(conversation, &usage).await,
      Err(e) => Err(e),
    }
  }

  pub async fn dispatch(&self, conversation: ConversationId, cmd: Command) -> Result<()> {
    debug!(target: "leetcoach", conversation, command = ?cmd, "Dispatching command");
    let s = &self.service;
    match cmd {
      Command::Help => s.help(conversation).await,
      Command::Question { topic } => s.request_question(conversation, &topic).await,
      Command::Hint { context } => s.hint(conversation, &context).await,
      Command::Done => s.mark_done(conversation).await,
      Command::Skip => s.skip(conversation).await,
      Command::Exit => s.exit(conversation).await,
      Command::Delete { slug } => s.delete_answered(conversation, &slug).await,
      Command::Answered { limit } => s.list_answered(conversation, limit).await,
      Command::Revise { slug } => s.revise(conversation, slug.as_deref()).await,
      Command::DailyOn { time } => s.daily_on(conversation, time.as_deref()).await,
      Command::DailyOff => s.daily_off(conversation).await,
      Command::DailyTime { time } => s.daily_time(conversation, &time).await,
      Command::DailyStatus => s.daily_status(conversation).await,
      Command::Unknown(_) => s.reply(conversation, messages::UNKNOWN_COMMAND).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn usage(text: &str) -> String {
    match Command::parse(text) {
      Err(BotError::Validation(u)) => u,
      other => panic!("expected validation error, got {:?}", other),
    }
  }

  #[test]
  fn bot_suffix_and_case_are_ignored() {
    assert_eq!(Command::parse("/LC@LeetCoachBot").unwrap(), Command::Question { topic: String::new() });
    assert_eq!(Command::parse("/Daily_Status@x").unwrap(), Command::DailyStatus);
  }

  #[test]
  fn aliases_map_to_the_same_command() {
    assert_eq!(Command::parse("/start").unwrap(), Command::Help);
    assert_eq!(Command::parse("/history 5").unwrap(), Command::Answered { limit: 5 });
    assert_eq!(
      Command::parse("/unrevise https://leetcode.com/problems/two-sum/").unwrap(),
      Command::Delete { slug: "two-sum".into() }
    );
  }

  #[test]
  fn topic_and_hint_context_keep_all_words() {
    assert_eq!(Command::parse("/lc binary   tree").unwrap(), Command::Question { topic: "binary tree".into() });
    assert_eq!(Command::parse("/hint stuck on dp").unwrap(), Command::Hint { context: "stuck on dp".into() });
  }

  #[test]
  fn times_are_normalized() {
    assert_eq!(Command::parse("/daily_on 7").unwrap(), Command::DailyOn { time: Some("07:00".into()) });
    assert_eq!(Command::parse("/daily_on").unwrap(), Command::DailyOn { time: None });
    assert_eq!(Command::parse("/daily_time 21:00").unwrap(), Command::DailyTime { time: "21:00".into() });
  }

  #[test]
  fn bad_arguments_yield_usage() {
    assert_eq!(usage("/delete"), USAGE_DELETE);
    assert_eq!(usage("/delete ///"), USAGE_DELETE);
    assert_eq!(usage("/answered 0"), USAGE_ANSWERED);
    assert_eq!(usage("/answered 51"), USAGE_ANSWERED);
    assert_eq!(usage("/daily_time"), USAGE_DAILY_TIME);
    assert_eq!(usage("/daily_time 25:00"), INVALID_DAILY_TIME);
    assert_eq!(usage("/daily_on noon"), INVALID_DAILY_ON);
  }

  #[test]
  fn unknown_commands_are_kept() {
    assert_eq!(Command::parse("/frobnicate").unwrap(), Command::Unknown("/frobnicate".into()));
  }

  #[test]
  fn limits() {
    assert_eq!(parse_positive_limit("50", 50), Some(50));
    assert_eq!(parse_positive_limit("-3", 50), None);
    assert_eq!(parse_positive_limit("x", 50), None);
  }
}
