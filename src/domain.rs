//! Domain models: questions, per-conversation settings, answered history, reviews.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Stable chat id; the unit of all per-user state.
pub type ConversationId = i64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  #[serde(alias = "easy")]
  Easy,
  #[serde(alias = "medium")]
  Medium,
  #[serde(alias = "hard")]
  Hard,
  #[default]
  #[serde(alias = "unknown")]
  Unknown,
}

impl Difficulty {
  /// LeetCode encodes difficulty as 1..=3 in its problem list.
  pub fn from_level(level: u8) -> Self {
    match level {
      1 => Difficulty::Easy,
      2 => Difficulty::Medium,
      3 => Difficulty::Hard,
      _ => Difficulty::Unknown,
    }
  }

  /// Case-insensitive parse; anything unrecognized is `Unknown`.
  pub fn parse(raw: &str) -> Self {
    match raw.trim().to_ascii_lowercase().as_str() {
      "easy" => Difficulty::Easy,
      "medium" => Difficulty::Medium,
      "hard" => Difficulty::Hard,
      _ => Difficulty::Unknown,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
      Difficulty::Unknown => "Unknown",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Immutable question reference. `slug` is the unique key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub slug: String,
  pub title: String,
  #[serde(default)]
  pub difficulty: Difficulty,
  #[serde(default)]
  pub url: String,
}

impl Question {
  pub fn problem_url(slug: &str) -> String {
    format!("https://leetcode.com/problems/{}/", slug)
  }
}

/// One record per conversation, owned by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSettings {
  pub id: ConversationId,
  #[serde(default)]
  pub daily_enabled: bool,
  #[serde(default)]
  pub daily_time: String,
  #[serde(default)]
  pub timezone: String,
  #[serde(default)]
  pub current_question: Option<Question>,
  #[serde(default)]
  pub last_daily_sent_on: Option<NaiveDate>,
  /// Set after a bare `/lc` when topic prompting is on; the next free text is the topic.
  #[serde(default)]
  pub awaiting_topic: bool,
}

impl ConversationSettings {
  pub fn with_defaults(id: ConversationId, daily_time: &str, timezone: &str) -> Self {
    Self {
      id,
      daily_enabled: false,
      daily_time: daily_time.to_string(),
      timezone: timezone.to_string(),
      current_question: None,
      last_daily_sent_on: None,
      awaiting_topic: false,
    }
  }
}

/// Entry of the answered-set. `attempts` is always at least 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnsweredEntry {
  pub question: Question,
  pub first_answered_at: DateTime<Utc>,
  pub last_answered_at: DateTime<Utc>,
  pub attempts: u32,
}

/// Result of grading one free-text answer, from the coach or the heuristic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Review {
  #[serde(default)]
  pub score: i32,
  #[serde(default)]
  pub feedback: String,
  #[serde(default)]
  pub guidance: String,
}
