//! Question bank backed by the `[[questions]]` table of the bot config file.
//!
//! Useful offline and in tests; the LeetCode client is the default bank.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::info;

use crate::config::QuestionCfg;
use crate::domain::Question;
use crate::error::{BotError, Result};
use crate::ports::QuestionBank;
use crate::selection::choose_unseen;
use crate::util::normalize_slug;

pub struct LocalBank {
  questions: Vec<Question>,
  prompts: HashMap<String, String>,
}

impl LocalBank {
  /// Entries with an empty slug or title are skipped; later duplicates lose.
  pub fn from_config(entries: &[QuestionCfg]) -> Result<Self> {
    let mut questions = Vec::new();
    let mut prompts = HashMap::new();
    let mut seen = HashSet::new();
    for e in entries {
      let slug = normalize_slug(&e.slug);
      let title = e.title.trim();
      if slug.is_empty() || title.is_empty() || !seen.insert(slug.clone()) {
        continue;
      }
      let url = match e.url.as_deref().map(str::trim) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => Question::problem_url(&slug),
      };
      if let Some(p) = e.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        prompts.insert(slug.clone(), p.to_string());
      }
      questions.push(Question { slug, title: title.to_string(), difficulty: e.difficulty(), url });
    }
    if questions.is_empty() {
      return Err(BotError::Config("bot config has no usable [[questions]] entries".into()));
    }
    info!(target: "leetcoach", questions = questions.len(), with_prompt = prompts.len(), "Local question bank ready");
    Ok(Self { questions, prompts })
  }
}

#[async_trait]
impl QuestionBank for LocalBank {
  async fn random(&self, excluding: &HashSet<String>) -> Result<Question> {
    choose_unseen(&self.questions, excluding)
  }

  async fn all(&self) -> Result<Vec<Question>> {
    Ok(self.questions.clone())
  }

  async fn prompt(&self, slug: &str) -> Result<String> {
    self
      .prompts
      .get(slug)
      .cloned()
      .ok_or_else(|| BotError::Bank(format!("no prompt for {}", slug)))
  }
}
