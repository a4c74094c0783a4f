//! Collaborator contracts consumed by the session core.
//!
//! Each trait is a thin I/O seam: the Telegram client, the question bank,
//! the optional AI coach, and the conversation store. Concrete adapters live in
//! `telegram`, `leetcode`/`bank`, `openai` and `store`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{AnsweredEntry, ConversationId, ConversationSettings, Question, Review};
use crate::error::Result;

#[async_trait]
pub trait Transport: Send + Sync {
  /// Plain text, no parse mode.
  async fn send(&self, conversation: ConversationId, text: &str) -> Result<()>;
  /// Text already rendered in the configured markup dialect.
  async fn send_rich(&self, conversation: ConversationId, markup: &str) -> Result<()>;
}

#[async_trait]
pub trait QuestionBank: Send + Sync {
  /// Uniform pick outside `excluding`; `BotError::Exhausted` when none is left.
  async fn random(&self, excluding: &HashSet<String>) -> Result<Question>;
  async fn all(&self) -> Result<Vec<Question>>;
  /// Plain-text problem statement.
  async fn prompt(&self, slug: &str) -> Result<String>;
}

#[async_trait]
pub trait Coach: Send + Sync {
  async fn review(&self, question: &Question, answer: &str) -> Result<Review>;
  async fn hint(&self, question: &Question, learner_context: &str) -> Result<String>;

  /// Question formatting is optional; coaches that cannot do it return `None`.
  fn formatter(&self) -> Option<&dyn QuestionFormatter> {
    None
  }
}

#[async_trait]
pub trait QuestionFormatter: Send + Sync {
  async fn format_question(&self, question: &Question, raw_prompt: &str) -> Result<String>;
}

/// Per-conversation persistence with field-level merge writes.
///
/// Implementations must serialize writes to one conversation record. Nothing
/// here is transactional across calls.
#[async_trait]
pub trait Store: Send + Sync {
  /// Lazily defaulted; never fails for an unknown id.
  async fn settings(&self, conversation: ConversationId) -> Result<ConversationSettings>;
  async fn upsert_daily(
    &self,
    conversation: ConversationId,
    enabled: bool,
    daily_time: &str,
    timezone: &str,
  ) -> Result<()>;
  /// Also ends any pending topic selection.
  async fn set_current_question(&self, conversation: ConversationId, question: &Question) -> Result<()>;
  async fn clear_current_question(&self, conversation: ConversationId) -> Result<()>;
  async fn set_awaiting_topic(&self, conversation: ConversationId, awaiting: bool) -> Result<()>;
  async fn mark_daily_sent(&self, conversation: ConversationId, day: NaiveDate) -> Result<()>;

  async fn add_served(&self, conversation: ConversationId, question: &Question) -> Result<()>;
  async fn remove_served(&self, conversation: ConversationId, slug: &str) -> Result<()>;
  async fn served_slugs(&self, conversation: ConversationId) -> Result<HashSet<String>>;
  async fn reset_served(&self, conversation: ConversationId) -> Result<()>;

  /// Inserts with `attempts = 1` or increments an existing entry.
  async fn mark_answered(&self, conversation: ConversationId, question: &Question, at: DateTime<Utc>) -> Result<()>;
  /// Latest first. `limit` is clamped to `1..=50`, 0 meaning the default of 10.
  async fn list_answered(&self, conversation: ConversationId, limit: usize) -> Result<Vec<AnsweredEntry>>;
  /// `BotError::NotFound` on a miss.
  async fn answered(&self, conversation: ConversationId, slug: &str) -> Result<AnsweredEntry>;
  /// `BotError::NotFound` on a miss.
  async fn delete_answered(&self, conversation: ConversationId, slug: &str) -> Result<()>;

  async fn daily_enabled(&self) -> Result<Vec<ConversationSettings>>;
}

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}
