//! Per-conversation practice session.
//!
//! A conversation is either `Idle` or `Active(question)`. The state lives in the
//! store's conversation record; every operation reads a fresh copy and writes
//! back individual fields. Multi-field transitions (persisting a completed
//! question, deleting an answered one) are a sequence of store calls and are
//! not atomic.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{ConversationId, ConversationSettings, Question, Review};
use crate::error::{BotError, Result};
use crate::grader::{self, grade_answer, passes};
use crate::hints::{fallback_hint, parse_hint_request};
use crate::markup::Renderer;
use crate::messages::{self, Source};
use crate::ports::{Clock, Coach, QuestionBank, Store, SystemClock, Transport};
use crate::selection::{is_unfiltered_topic, pick_by_topic, pick_unique};
use crate::store::MAX_ANSWERED_LIMIT;
use crate::util::tz_label;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
  Idle,
  Active(Question),
}

impl SessionState {
  pub fn of(settings: &ConversationSettings) -> Self {
    match &settings.current_question {
      Some(q) => SessionState::Active(q.clone()),
      None => SessionState::Idle,
    }
  }
}

/// Values used when a conversation has not chosen its own.
#[derive(Clone, Debug)]
pub struct DailyDefaults {
  pub time: String,
  pub timezone: String,
}

pub struct PracticeService {
  transport: Arc<dyn Transport>,
  bank: Arc<dyn QuestionBank>,
  coach: Option<Arc<dyn Coach>>,
  store: Arc<dyn Store>,
  renderer: Renderer,
  clock: Arc<dyn Clock>,
  defaults: DailyDefaults,
  topic_prompt: bool,
}

impl PracticeService {
  pub fn new(
    transport: Arc<dyn Transport>,
    bank: Arc<dyn QuestionBank>,
    store: Arc<dyn Store>,
    renderer: Renderer,
    defaults: DailyDefaults,
  ) -> Self {
    Self {
      transport,
      bank,
      coach: None,
      store,
      renderer,
      clock: Arc::new(SystemClock),
      defaults,
      topic_prompt: false,
    }
  }

  pub fn with_coach(mut self, coach: Option<Arc<dyn Coach>>) -> Self {
    self.coach = coach;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Ask "which topic?" on a bare `/lc` instead of serving straight away.
  pub fn with_topic_prompt(mut self, enabled: bool) -> Self {
    self.topic_prompt = enabled;
    self
  }

  pub fn store(&self) -> &Arc<dyn Store> {
    &self.store
  }

  pub fn bank(&self) -> &Arc<dyn QuestionBank> {
    &self.bank
  }

  pub fn defaults(&self) -> &DailyDefaults {
    &self.defaults
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  pub async fn state(&self, conversation: ConversationId) -> Result<SessionState> {
    Ok(SessionState::of(&self.store.settings(conversation).await?))
  }

  /// Plain-text reply.
  pub async fn reply(&self, conversation: ConversationId, text: &str) -> Result<()> {
    self.transport.send(conversation, text).await
  }

  // ---------- question lifecycle ----------

  /// `/lc [topic]`. The active question, if any, is never served again here.
  #[instrument(level = "info", skip(self))]
  pub async fn request_question(&self, conversation: ConversationId, topic: &str) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    let transient = active_slug(&settings);

    if topic.trim().is_empty() && self.topic_prompt && settings.current_question.is_none() {
      self.store.set_awaiting_topic(conversation, true).await?;
      return self.reply(conversation, messages::TOPIC_PROMPT).await;
    }
    if settings.awaiting_topic {
      self.store.set_awaiting_topic(conversation, false).await?;
    }
    self.serve(conversation, messages::INTRO_RANDOM, topic, &transient).await
  }

  /// `/skip`. The skipped slug is excluded for this pick only.
  #[instrument(level = "info", skip(self))]
  pub async fn skip(&self, conversation: ConversationId) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    if settings.current_question.is_none() {
      return self.reply(conversation, messages::NO_ACTIVE_TO_SKIP).await;
    }
    let transient = active_slug(&settings);
    self.serve(conversation, messages::INTRO_SKIP, "", &transient).await
  }

  /// `/done`: persist as answered without grading.
  #[instrument(level = "info", skip(self))]
  pub async fn mark_done(&self, conversation: ConversationId) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    let Some(question) = settings.current_question else {
      return self.reply(conversation, messages::NO_ACTIVE_QUESTION).await;
    };
    self.persist_completed(conversation, &question).await?;
    self.reply(conversation, messages::DONE_SAVED).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn exit(&self, conversation: ConversationId) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    if settings.current_question.is_none() {
      return self.reply(conversation, messages::NO_ACTIVE_PRACTICE).await;
    }
    self.store.clear_current_question(conversation).await?;
    self.reply(conversation, messages::EXITED).await
  }

  /// Non-command text: a pending topic, a hint request, or an answer to grade.
  #[instrument(level = "info", skip(self, text), fields(len = text.len()))]
  pub async fn submit_free_text(&self, conversation: ConversationId, text: &str) -> Result<()> {
    let settings = self.store.settings(conversation).await?;

    let Some(question) = settings.current_question else {
      if settings.awaiting_topic {
        self.store.set_awaiting_topic(conversation, false).await?;
        return self.serve(conversation, messages::INTRO_RANDOM, text, &HashSet::new()).await;
      }
      return self.reply(conversation, messages::NO_ACTIVE_QUESTION).await;
    };
    if settings.awaiting_topic {
      warn!(target: "session", conversation, "Dropping stale topic prompt; grading instead");
      self.store.set_awaiting_topic(conversation, false).await?;
    }

    if let Some(context) = parse_hint_request(text) {
      return self.send_hint(conversation, &question, &context).await;
    }

    let (review, source) = self.review(&question, text).await;
    let score = grader::clamp_score(review.score);
    let feedback = match review.feedback.trim() {
      "" => messages::NO_FEEDBACK.to_string(),
      f => f.to_string(),
    };
    let guidance = match review.guidance.trim() {
      "" => grader::fallback_guidance(&question, text),
      g => g.to_string(),
    };

    let status = if passes(score) {
      self.persist_completed(conversation, &question).await?;
      messages::STATUS_SAVED
    } else {
      messages::STATUS_NOT_SAVED
    };
    info!(target: "session", conversation, slug = %question.slug, score, source = %source, saved = passes(score), "Answer graded");

    let body = messages::evaluation_message(&self.renderer, &question, score, source, &feedback, &guidance, status);
    self.transport.send_rich(conversation, &body).await
  }

  /// `/hint [context]`.
  #[instrument(level = "info", skip(self, context))]
  pub async fn hint(&self, conversation: ConversationId, context: &str) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    let Some(question) = settings.current_question else {
      return self.reply(conversation, messages::NO_ACTIVE_QUESTION).await;
    };
    self.send_hint(conversation, &question, context.trim()).await
  }

  // ---------- history ----------

  /// `/delete <slug>`. `slug` is already normalized.
  #[instrument(level = "info", skip(self))]
  pub async fn delete_answered(&self, conversation: ConversationId, slug: &str) -> Result<()> {
    match self.store.delete_answered(conversation, slug).await {
      Ok(()) => {}
      Err(e) if e.is_not_found() => return self.reply(conversation, messages::DELETE_NOT_FOUND).await,
      Err(e) => return Err(e),
    }
    self.store.remove_served(conversation, slug).await?;

    let settings = self.store.settings(conversation).await?;
    if settings.current_question.as_ref().is_some_and(|q| q.slug == slug) {
      self.store.clear_current_question(conversation).await?;
    }
    self.reply(conversation, &messages::deleted(slug)).await
  }

  /// `/answered [n]`. `limit` 0 means the default.
  #[instrument(level = "debug", skip(self))]
  pub async fn list_answered(&self, conversation: ConversationId, limit: usize) -> Result<()> {
    let entries = self.store.list_answered(conversation, limit).await?;
    if entries.is_empty() {
      return self.reply(conversation, messages::NO_ANSWERED).await;
    }
    self.reply(conversation, &messages::answered_list(&entries)).await
  }

  /// `/revise [slug]`. Without a slug, the pick is derived from the clock:
  /// arbitrary, not uniformly fair. Served and answered sets are untouched.
  #[instrument(level = "info", skip(self))]
  pub async fn revise(&self, conversation: ConversationId, slug: Option<&str>) -> Result<()> {
    let question = match slug {
      Some(slug) => match self.store.answered(conversation, slug).await {
        Ok(entry) => entry.question,
        Err(e) if e.is_not_found() => return self.reply(conversation, messages::REVISE_NOT_FOUND).await,
        Err(e) => return Err(e),
      },
      None => {
        let entries = self.store.list_answered(conversation, MAX_ANSWERED_LIMIT).await?;
        if entries.is_empty() {
          return self.reply(conversation, messages::NOTHING_TO_REVISE).await;
        }
        let idx = (self.clock.now().timestamp_millis().unsigned_abs() % entries.len() as u64) as usize;
        entries[idx].question.clone()
      }
    };

    self.store.set_current_question(conversation, &question).await?;
    let prompt = self.question_prompt(&question).await;
    let body = messages::question_message(&self.renderer, messages::INTRO_REVISE, "", &question, &prompt);
    self.transport.send_rich(conversation, &body).await
  }

  // ---------- daily settings ----------

  /// `/daily_on [HH:MM]`. Keeps the stored time when none is given.
  #[instrument(level = "info", skip(self))]
  pub async fn daily_on(&self, conversation: ConversationId, time: Option<&str>) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    let hhmm = match time {
      Some(t) => t.to_string(),
      None => self.effective_time(&settings),
    };
    let tz = self.effective_timezone(&settings);
    self.store.upsert_daily(conversation, true, &hhmm, &tz).await?;
    self.reply(conversation, &messages::daily_on(&hhmm, tz_label(&tz))).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn daily_off(&self, conversation: ConversationId) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    let hhmm = self.effective_time(&settings);
    let tz = self.effective_timezone(&settings);
    self.store.upsert_daily(conversation, false, &hhmm, &tz).await?;
    self.reply(conversation, messages::DAILY_OFF).await
  }

  /// `/daily_time HH:MM`: sets the time and enables delivery.
  #[instrument(level = "info", skip(self))]
  pub async fn daily_time(&self, conversation: ConversationId, time: &str) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    let tz = self.effective_timezone(&settings);
    self.store.upsert_daily(conversation, true, time, &tz).await?;
    self.reply(conversation, &messages::daily_time_set(time, tz_label(&tz))).await
  }

  pub async fn daily_status(&self, conversation: ConversationId) -> Result<()> {
    let settings = self.store.settings(conversation).await?;
    let hhmm = self.effective_time(&settings);
    let tz = self.effective_timezone(&settings);
    self
      .reply(conversation, &messages::daily_status(settings.daily_enabled, &hhmm, tz_label(&tz)))
      .await
  }

  pub async fn help(&self, conversation: ConversationId) -> Result<()> {
    let text = messages::help_text(tz_label(&self.defaults.timezone), &self.defaults.time);
    self.reply(conversation, &text).await
  }

  // ---------- shared primitives ----------

  /// Picks a unique question, makes it current, and sends it.
  ///
  /// Used by interactive requests and by the daily scheduler. Returns
  /// `BotError::Exhausted` only when the bank has nothing at all to offer.
  #[instrument(level = "debug", skip(self, transient))]
  pub async fn deliver_unique(
    &self,
    conversation: ConversationId,
    intro: &str,
    transient: &HashSet<String>,
  ) -> Result<Question> {
    let selection = pick_unique(self.bank.as_ref(), self.store.as_ref(), conversation, transient).await?;
    let question = selection.question;
    let note = if selection.history_reset { messages::HISTORY_RESET_NOTE } else { "" };
    self.deliver(conversation, intro, note, &question).await?;
    Ok(question)
  }

  async fn serve(
    &self,
    conversation: ConversationId,
    intro: &str,
    topic: &str,
    transient: &HashSet<String>,
  ) -> Result<()> {
    if is_unfiltered_topic(topic) {
      return match self.deliver_unique(conversation, intro, transient).await {
        Ok(_) => Ok(()),
        Err(BotError::Exhausted) => {
          warn!(target: "session", conversation, "Question bank is empty");
          self.reply(conversation, messages::BANK_EMPTY).await
        }
        Err(e) => Err(e),
      };
    }

    match pick_by_topic(self.bank.as_ref(), self.store.as_ref(), conversation, topic, transient).await? {
      Some(question) => self.deliver(conversation, intro, "", &question).await,
      None => self.reply(conversation, messages::NO_TOPIC_MATCH).await,
    }
  }

  async fn deliver(&self, conversation: ConversationId, intro: &str, note: &str, question: &Question) -> Result<()> {
    self.store.set_current_question(conversation, question).await?;
    let prompt = self.question_prompt(question).await;
    let body = messages::question_message(&self.renderer, intro, note, question, &prompt);
    info!(target: "session", conversation, slug = %question.slug, "Question served");
    self.transport.send_rich(conversation, &body).await
  }

  /// Problem statement, reformatted by the coach when it can. Never fails:
  /// an empty string makes the message fall back to the problem URL.
  async fn question_prompt(&self, question: &Question) -> String {
    let raw = match self.bank.prompt(&question.slug).await {
      Ok(p) => p.trim().to_string(),
      Err(e) => {
        warn!(target: "session", slug = %question.slug, error = %e, "Question prompt lookup failed");
        return String::new();
      }
    };
    if raw.is_empty() {
      return raw;
    }
    let Some(formatter) = self.coach.as_ref().and_then(|c| c.formatter()) else {
      return raw;
    };
    match formatter.format_question(question, &raw).await {
      Ok(formatted) if !formatted.trim().is_empty() => formatted.trim().to_string(),
      Ok(_) => {
        warn!(target: "session", slug = %question.slug, "Coach formatting returned nothing; using raw prompt");
        raw
      }
      Err(e) => {
        warn!(target: "session", slug = %question.slug, error = %e, "Coach formatting failed; using raw prompt");
        raw
      }
    }
  }

  async fn persist_completed(&self, conversation: ConversationId, question: &Question) -> Result<()> {
    self.store.add_served(conversation, question).await?;
    self.store.mark_answered(conversation, question, self.clock.now()).await?;
    self.store.clear_current_question(conversation).await?;
    info!(target: "session", conversation, slug = %question.slug, "Question persisted as answered");
    Ok(())
  }

  async fn review(&self, question: &Question, answer: &str) -> (Review, Source) {
    if let Some(coach) = &self.coach {
      match coach.review(question, answer).await {
        Ok(review) => return (grader::normalize_coach_review(review), Source::Ai),
        Err(e) => warn!(target: "session", slug = %question.slug, error = %e, "Coach review failed; using heuristic grading"),
      }
    }
    let grade = grade_answer(answer, question.difficulty);
    let review = Review {
      score: grade.score,
      feedback: grade.feedback,
      guidance: grader::fallback_guidance(question, answer),
    };
    (review, Source::Heuristic)
  }

  async fn send_hint(&self, conversation: ConversationId, question: &Question, context: &str) -> Result<()> {
    let (hint, source) = self.generate_hint(question, context).await;
    let body = messages::hint_message(&self.renderer, question, source, &hint);
    self.transport.send_rich(conversation, &body).await
  }

  async fn generate_hint(&self, question: &Question, context: &str) -> (String, Source) {
    if let Some(coach) = &self.coach {
      match coach.hint(question, context).await {
        Ok(hint) if !hint.trim().is_empty() => return (hint.trim().to_string(), Source::Ai),
        Ok(_) => warn!(target: "session", slug = %question.slug, "Coach hint was empty; using heuristic hint"),
        Err(e) => warn!(target: "session", slug = %question.slug, error = %e, "Coach hint failed; using heuristic hint"),
      }
    }
    (fallback_hint(question, context), Source::Heuristic)
  }

  fn effective_time(&self, settings: &ConversationSettings) -> String {
    if settings.daily_time.is_empty() {
      self.defaults.time.clone()
    } else {
      settings.daily_time.clone()
    }
  }

  fn effective_timezone(&self, settings: &ConversationSettings) -> String {
    if settings.timezone.is_empty() {
      self.defaults.timezone.clone()
    } else {
      settings.timezone.clone()
    }
  }
}

fn active_slug(settings: &ConversationSettings) -> HashSet<String> {
  settings.current_question.iter().map(|q| q.slug.clone()).collect()
}
