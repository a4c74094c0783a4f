//! In-process fakes for the collaborator traits, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{ConversationId, Difficulty, Question, Review};
use crate::error::{BotError, Result};
use crate::markup::{MarkupKind, Renderer};
use crate::ports::{Clock, Coach, QuestionBank, QuestionFormatter, Transport};
use crate::session::{DailyDefaults, PracticeService};
use crate::store::MemoryStore;

pub fn question(slug: &str, title: &str, difficulty: Difficulty) -> Question {
  Question { slug: slug.into(), title: title.into(), difficulty, url: Question::problem_url(slug) }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
  pub conversation: ConversationId,
  pub text: String,
  pub rich: bool,
}

/// Records every send; conversations in `failing` get a transport error.
#[derive(Default)]
pub struct RecordingTransport {
  sent: Mutex<Vec<Sent>>,
  failing: Mutex<HashSet<ConversationId>>,
}

impl RecordingTransport {
  pub fn fail_for(&self, conversation: ConversationId) {
    self.failing.lock().unwrap().insert(conversation);
  }

  pub fn sent(&self) -> Vec<Sent> {
    self.sent.lock().unwrap().clone()
  }

  pub fn last(&self) -> Sent {
    self.sent.lock().unwrap().last().cloned().expect("nothing was sent")
  }

  fn push(&self, conversation: ConversationId, text: &str, rich: bool) -> Result<()> {
    if self.failing.lock().unwrap().contains(&conversation) {
      return Err(BotError::Transport("simulated failure".into()));
    }
    self.sent.lock().unwrap().push(Sent { conversation, text: text.to_string(), rich });
    Ok(())
  }
}

#[async_trait]
impl Transport for RecordingTransport {
  async fn send(&self, conversation: ConversationId, text: &str) -> Result<()> {
    self.push(conversation, text, false)
  }

  async fn send_rich(&self, conversation: ConversationId, markup: &str) -> Result<()> {
    self.push(conversation, markup, true)
  }
}

/// Always hands out the first question not excluded, so picks are predictable.
pub struct OrderedBank {
  questions: Vec<Question>,
  prompts: HashMap<String, String>,
}

impl OrderedBank {
  pub fn new(questions: Vec<Question>) -> Self {
    Self { questions, prompts: HashMap::new() }
  }

  pub fn with_prompt(mut self, slug: &str, prompt: &str) -> Self {
    self.prompts.insert(slug.into(), prompt.into());
    self
  }
}

#[async_trait]
impl QuestionBank for OrderedBank {
  async fn random(&self, excluding: &HashSet<String>) -> Result<Question> {
    self.questions.iter().find(|q| !excluding.contains(&q.slug)).cloned().ok_or(BotError::Exhausted)
  }

  async fn all(&self) -> Result<Vec<Question>> {
    Ok(self.questions.clone())
  }

  async fn prompt(&self, slug: &str) -> Result<String> {
    self.prompts.get(slug).cloned().ok_or_else(|| BotError::Bank(format!("no prompt for {}", slug)))
  }
}

/// What the canned coach does when asked to format a problem statement.
#[derive(Clone, Debug, Default)]
pub enum Formatting {
  /// The coach has no formatter at all.
  #[default]
  Unsupported,
  Returns(String),
  Fails,
}

/// Canned coach. `None` in a field makes that call fail.
#[derive(Default)]
pub struct FakeCoach {
  pub review: Option<Review>,
  pub hint: Option<String>,
  pub formatting: Formatting,
}

#[async_trait]
impl Coach for FakeCoach {
  async fn review(&self, _question: &Question, _answer: &str) -> Result<Review> {
    self.review.clone().ok_or_else(|| BotError::Coach("review unavailable".into()))
  }

  async fn hint(&self, _question: &Question, _learner_context: &str) -> Result<String> {
    self.hint.clone().ok_or_else(|| BotError::Coach("hint unavailable".into()))
  }

  fn formatter(&self) -> Option<&dyn QuestionFormatter> {
    match self.formatting {
      Formatting::Unsupported => None,
      _ => Some(self),
    }
  }
}

#[async_trait]
impl QuestionFormatter for FakeCoach {
  async fn format_question(&self, _question: &Question, _raw_prompt: &str) -> Result<String> {
    match &self.formatting {
      Formatting::Returns(text) => Ok(text.clone()),
      Formatting::Unsupported | Formatting::Fails => Err(BotError::Coach("formatting unavailable".into())),
    }
  }
}

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
  pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Self {
    Self(Mutex::new(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()))
  }

  pub fn set(&self, now: DateTime<Utc>) {
    *self.0.lock().unwrap() = now;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    *self.0.lock().unwrap()
  }
}

/// Everything a flow test needs, wired with defaults of 20:00 Asia/Singapore.
pub struct Harness {
  pub transport: Arc<RecordingTransport>,
  pub store: Arc<MemoryStore>,
  pub clock: Arc<FixedClock>,
  pub service: Arc<PracticeService>,
}

pub struct HarnessBuilder {
  bank: OrderedBank,
  coach: Option<Arc<dyn Coach>>,
  topic_prompt: bool,
  markup: MarkupKind,
}

impl HarnessBuilder {
  pub fn new(bank: OrderedBank) -> Self {
    Self { bank, coach: None, topic_prompt: false, markup: MarkupKind::Html }
  }

  pub fn coach(mut self, coach: FakeCoach) -> Self {
    self.coach = Some(Arc::new(coach));
    self
  }

  pub fn topic_prompt(mut self) -> Self {
    self.topic_prompt = true;
    self
  }

  pub fn markup(mut self, markup: MarkupKind) -> Self {
    self.markup = markup;
    self
  }

  pub fn build(self) -> Harness {
    let transport = Arc::new(RecordingTransport::default());
    let store = Arc::new(MemoryStore::new("20:00", "Asia/Singapore"));
    let clock = Arc::new(FixedClock::at(2026, 2, 14, 1, 0));
    let defaults = DailyDefaults { time: "20:00".into(), timezone: "Asia/Singapore".into() };
    let service = PracticeService::new(
      transport.clone(),
      Arc::new(self.bank),
      store.clone(),
      Renderer::new(self.markup),
      defaults,
    )
    .with_coach(self.coach)
    .with_clock(clock.clone())
    .with_topic_prompt(self.topic_prompt);
    Harness { transport, store, clock, service: Arc::new(service) }
  }
}

/// Two easy questions and one hard one, in that order.
pub fn sample_bank() -> OrderedBank {
  OrderedBank::new(vec![
    question("two-sum", "Two Sum", Difficulty::Easy),
    question("valid-parentheses", "Valid Parentheses", Difficulty::Easy),
    question("median-of-two-sorted-arrays", "Median of Two Sorted Arrays", Difficulty::Hard),
  ])
  .with_prompt("two-sum", "Given an array of integers, return indices of the two numbers that add up to target.")
}
