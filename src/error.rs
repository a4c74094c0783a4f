//! Error taxonomy shared by the session core and its collaborators.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
  /// Answered-question lookup miss. Carries the normalized slug.
  #[error("answered question not found: {0}")]
  NotFound(String),

  /// The question bank has no candidate outside the exclusion set.
  #[error("no unseen questions available")]
  Exhausted,

  /// Malformed command arguments, rejected before any state change.
  #[error("invalid input: {0}")]
  Validation(String),

  #[error("store error: {0}")]
  Store(String),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("question bank error: {0}")]
  Bank(String),

  #[error("coach error: {0}")]
  Coach(String),

  #[error("configuration error: {0}")]
  Config(String),
}

impl BotError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, BotError::NotFound(_))
  }

  pub fn is_exhausted(&self) -> bool {
    matches!(self, BotError::Exhausted)
  }
}

pub type Result<T, E = BotError> = std::result::Result<T, E>;
