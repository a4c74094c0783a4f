//! Question selection under the per-conversation uniqueness policy.
//!
//! Effective exclusions are the persisted served-set plus any transient slugs
//! (typically the active question). When the bank runs dry the served-set is
//! reset and the pick retried, first keeping the transient exclusions and then,
//! as a last resort, with nothing excluded.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use tracing::{info, instrument};

use crate::domain::{ConversationId, Question};
use crate::error::{BotError, Result};
use crate::ports::{QuestionBank, Store};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
  pub question: Question,
  /// The served-set was cleared to make this pick possible.
  pub history_reset: bool,
}

/// Uniform pick among `questions` whose slug is not excluded.
/// Shared by the bank adapters.
pub fn choose_unseen(questions: &[Question], excluding: &HashSet<String>) -> Result<Question> {
  let eligible: Vec<&Question> = questions.iter().filter(|q| !excluding.contains(&q.slug)).collect();
  eligible
    .choose(&mut rand::thread_rng())
    .map(|q| (*q).clone())
    .ok_or(BotError::Exhausted)
}

/// `random` and the empty topic both mean "no filter".
pub fn is_unfiltered_topic(topic: &str) -> bool {
  let t = topic.trim();
  t.is_empty() || t.eq_ignore_ascii_case("random")
}

/// Substring match of a lowercase topic against title, slug and difficulty.
pub fn matches_topic(question: &Question, topic_lower: &str) -> bool {
  let haystack = format!("{} {} {}", question.title, question.slug, question.difficulty).to_lowercase();
  haystack.contains(topic_lower)
}

#[instrument(level = "debug", skip(bank, store, transient), fields(transient = transient.len()))]
pub async fn pick_unique(
  bank: &dyn QuestionBank,
  store: &dyn Store,
  conversation: ConversationId,
  transient: &HashSet<String>,
) -> Result<Selection> {
  let served = store.served_slugs(conversation).await?;
  let effective: HashSet<String> = served.union(transient).cloned().collect();

  match bank.random(&effective).await {
    Ok(question) => return Ok(Selection { question, history_reset: false }),
    Err(BotError::Exhausted) => {}
    Err(e) => return Err(e),
  }

  info!(target: "session", conversation, served = served.len(), "Bank exhausted for conversation; resetting served history");
  store.reset_served(conversation).await?;

  let question = match bank.random(transient).await {
    Err(BotError::Exhausted) if !transient.is_empty() => bank.random(&HashSet::new()).await?,
    other => other?,
  };
  Ok(Selection { question, history_reset: true })
}

/// Topic-filtered pick. `None` when nothing unseen matches; never falls back
/// to an unfiltered pick.
#[instrument(level = "debug", skip(bank, store, transient))]
pub async fn pick_by_topic(
  bank: &dyn QuestionBank,
  store: &dyn Store,
  conversation: ConversationId,
  topic: &str,
  transient: &HashSet<String>,
) -> Result<Option<Question>> {
  let topic = topic.trim().to_lowercase();
  let all = bank.all().await?;
  let served = store.served_slugs(conversation).await?;

  let candidates: Vec<Question> = all
    .into_iter()
    .filter(|q| !served.contains(&q.slug) && !transient.contains(&q.slug))
    .filter(|q| matches_topic(q, &topic))
    .collect();

  Ok(candidates.choose(&mut rand::thread_rng()).cloned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;
  use crate::store::MemoryStore;
  use async_trait::async_trait;

  struct VecBank(Vec<Question>);

  #[async_trait]
  impl QuestionBank for VecBank {
    async fn random(&self, excluding: &HashSet<String>) -> Result<Question> {
      choose_unseen(&self.0, excluding)
    }
    async fn all(&self) -> Result<Vec<Question>> {
      Ok(self.0.clone())
    }
    async fn prompt(&self, _slug: &str) -> Result<String> {
      Ok(String::new())
    }
  }

  fn q(slug: &str, title: &str, difficulty: Difficulty) -> Question {
    Question { slug: slug.into(), title: title.into(), difficulty, url: String::new() }
  }

  fn bank() -> VecBank {
    VecBank(vec![
      q("two-sum", "Two Sum", Difficulty::Easy),
      q("lru-cache", "LRU Cache", Difficulty::Medium),
    ])
  }

  fn set(slugs: &[&str]) -> HashSet<String> {
    slugs.iter().map(|s| s.to_string()).collect()
  }

  #[tokio::test]
  async fn transient_exclusion_is_honored() {
    let store = MemoryStore::new("20:00", "UTC");
    for _ in 0..20 {
      let pick = pick_unique(&bank(), &store, 1, &set(&["two-sum"])).await.unwrap();
      assert_eq!(pick.question.slug, "lru-cache");
      assert!(!pick.history_reset);
    }
  }

  #[tokio::test]
  async fn exhaustion_resets_served_and_keeps_transient() {
    let store = MemoryStore::new("20:00", "UTC");
    let b = bank();
    store.add_served(1, &b.0[0]).await.unwrap();
    store.add_served(1, &b.0[1]).await.unwrap();

    let pick = pick_unique(&b, &store, 1, &set(&["lru-cache"])).await.unwrap();
    assert!(pick.history_reset);
    assert_eq!(pick.question.slug, "two-sum");
    assert!(store.served_slugs(1).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn single_question_bank_falls_back_to_empty_exclusions() {
    let store = MemoryStore::new("20:00", "UTC");
    let b = VecBank(vec![q("only", "Only", Difficulty::Hard)]);
    let pick = pick_unique(&b, &store, 1, &set(&["only"])).await.unwrap();
    assert_eq!(pick.question.slug, "only");
    assert!(pick.history_reset);
  }

  #[tokio::test]
  async fn empty_bank_stays_exhausted() {
    let store = MemoryStore::new("20:00", "UTC");
    let err = pick_unique(&VecBank(vec![]), &store, 1, &HashSet::new()).await.unwrap_err();
    assert!(err.is_exhausted());
  }

  #[tokio::test]
  async fn topic_filter_matches_title_slug_and_difficulty() {
    let store = MemoryStore::new("20:00", "UTC");
    let b = bank();
    let hit = pick_by_topic(&b, &store, 1, " Cache ", &HashSet::new()).await.unwrap();
    assert_eq!(hit.map(|q| q.slug), Some("lru-cache".to_string()));
    let hit = pick_by_topic(&b, &store, 1, "easy", &HashSet::new()).await.unwrap();
    assert_eq!(hit.map(|q| q.slug), Some("two-sum".to_string()));
  }

  #[tokio::test]
  async fn topic_filter_never_falls_back() {
    let store = MemoryStore::new("20:00", "UTC");
    let b = bank();
    store.add_served(1, &b.0[1]).await.unwrap();
    assert_eq!(pick_by_topic(&b, &store, 1, "cache", &HashSet::new()).await.unwrap(), None);
    assert_eq!(pick_by_topic(&b, &store, 1, "graph", &HashSet::new()).await.unwrap(), None);
  }

  #[test]
  fn random_topic_is_unfiltered() {
    assert!(is_unfiltered_topic(" RANDOM "));
    assert!(is_unfiltered_topic(""));
    assert!(!is_unfiltered_topic("dp"));
  }
}
