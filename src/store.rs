//! In-memory conversation store with an optional JSON snapshot on disk.
//!
//! All records sit behind one `tokio::sync::RwLock`, so writes to the same
//! conversation are serialized. When a snapshot path is configured every write
//! rewrites the file (temp file + rename) before releasing the lock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{AnsweredEntry, ConversationId, ConversationSettings, Question};
use crate::error::{BotError, Result};
use crate::ports::Store;

pub const DEFAULT_ANSWERED_LIMIT: usize = 10;
pub const MAX_ANSWERED_LIMIT: usize = 50;

/// 0 means the default; anything above the cap is clamped.
pub fn normalize_limit(limit: usize) -> usize {
  if limit == 0 {
    DEFAULT_ANSWERED_LIMIT
  } else {
    limit.min(MAX_ANSWERED_LIMIT)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ConversationRecord {
  settings: ConversationSettings,
  #[serde(default)]
  served: BTreeMap<String, Question>,
  #[serde(default)]
  answered: BTreeMap<String, AnsweredEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
  #[serde(default)]
  conversations: Vec<ConversationRecord>,
}

#[derive(Clone)]
pub struct MemoryStore {
  records: Arc<RwLock<HashMap<ConversationId, ConversationRecord>>>,
  snapshot: Option<PathBuf>,
  default_time: String,
  default_timezone: String,
}

impl MemoryStore {
  pub fn new(default_time: &str, default_timezone: &str) -> Self {
    Self {
      records: Arc::new(RwLock::new(HashMap::new())),
      snapshot: None,
      default_time: default_time.to_string(),
      default_timezone: default_timezone.to_string(),
    }
  }

  /// Loads `path` when it exists; later writes keep it up to date.
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub async fn with_snapshot(default_time: &str, default_timezone: &str, path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let mut records = HashMap::new();
    match tokio::fs::read_to_string(&path).await {
      Ok(raw) => {
        let snap: Snapshot = serde_json::from_str(&raw)
          .map_err(|e| BotError::Store(format!("snapshot {} is not valid JSON: {}", path.display(), e)))?;
        for rec in snap.conversations {
          records.insert(rec.settings.id, rec);
        }
        info!(target: "leetcoach", conversations = records.len(), "Loaded store snapshot");
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        info!(target: "leetcoach", "No store snapshot yet; starting empty");
      }
      Err(e) => return Err(BotError::Store(format!("read {}: {}", path.display(), e))),
    }
    Ok(Self {
      records: Arc::new(RwLock::new(records)),
      snapshot: Some(path),
      default_time: default_time.to_string(),
      default_timezone: default_timezone.to_string(),
    })
  }

  fn fresh(&self, id: ConversationId) -> ConversationRecord {
    ConversationRecord {
      settings: ConversationSettings::with_defaults(id, &self.default_time, &self.default_timezone),
      served: BTreeMap::new(),
      answered: BTreeMap::new(),
    }
  }

  async fn read<T>(&self, id: ConversationId, f: impl FnOnce(&ConversationRecord) -> T) -> T {
    let guard = self.records.read().await;
    match guard.get(&id) {
      Some(rec) => f(rec),
      None => f(&self.fresh(id)),
    }
  }

  /// Applies `f` to a copy of the record; memory changes only once the
  /// snapshot (when configured) is written.
  async fn mutate<T>(
    &self,
    id: ConversationId,
    f: impl FnOnce(&mut ConversationRecord) -> Result<T>,
  ) -> Result<T> {
    let mut guard = self.records.write().await;
    let mut rec = guard.get(&id).cloned().unwrap_or_else(|| self.fresh(id));
    let out = f(&mut rec)?;
    match &self.snapshot {
      Some(path) => {
        let previous = guard.insert(id, rec);
        if let Err(e) = persist(path, &guard).await {
          match previous {
            Some(old) => guard.insert(id, old),
            None => guard.remove(&id),
          };
          return Err(e);
        }
      }
      None => {
        guard.insert(id, rec);
      }
    }
    Ok(out)
  }
}

async fn persist(path: &Path, records: &HashMap<ConversationId, ConversationRecord>) -> Result<()> {
  let mut conversations: Vec<&ConversationRecord> = records.values().collect();
  conversations.sort_by_key(|r| r.settings.id);
  let body = serde_json::to_vec_pretty(&serde_json::json!({ "conversations": conversations }))
    .map_err(|e| BotError::Store(format!("encode snapshot: {}", e)))?;

  let tmp = path.with_extension("tmp");
  tokio::fs::write(&tmp, &body)
    .await
    .map_err(|e| BotError::Store(format!("write {}: {}", tmp.display(), e)))?;
  tokio::fs::rename(&tmp, path)
    .await
    .map_err(|e| BotError::Store(format!("rename to {}: {}", path.display(), e)))?;
  debug!(target: "leetcoach", bytes = body.len(), "Store snapshot written");
  Ok(())
}

#[async_trait]
impl Store for MemoryStore {
  async fn settings(&self, conversation: ConversationId) -> Result<ConversationSettings> {
    Ok(self.read(conversation, |r| r.settings.clone()).await)
  }

  async fn upsert_daily(
    &self,
    conversation: ConversationId,
    enabled: bool,
    daily_time: &str,
    timezone: &str,
  ) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.settings.daily_enabled = enabled;
        r.settings.daily_time = daily_time.to_string();
        r.settings.timezone = timezone.to_string();
        Ok(())
      })
      .await
  }

  async fn set_current_question(&self, conversation: ConversationId, question: &Question) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.settings.current_question = Some(question.clone());
        r.settings.awaiting_topic = false;
        Ok(())
      })
      .await
  }

  async fn clear_current_question(&self, conversation: ConversationId) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.settings.current_question = None;
        Ok(())
      })
      .await
  }

  async fn set_awaiting_topic(&self, conversation: ConversationId, awaiting: bool) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.settings.awaiting_topic = awaiting;
        Ok(())
      })
      .await
  }

  async fn mark_daily_sent(&self, conversation: ConversationId, day: NaiveDate) -> Result<()> {
    self
      .mutate(conversation, |r| {
        // Never move the marker backwards.
        if r.settings.last_daily_sent_on.map_or(true, |prev| prev < day) {
          r.settings.last_daily_sent_on = Some(day);
        }
        Ok(())
      })
      .await
  }

  async fn add_served(&self, conversation: ConversationId, question: &Question) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.served.insert(question.slug.clone(), question.clone());
        Ok(())
      })
      .await
  }

  async fn remove_served(&self, conversation: ConversationId, slug: &str) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.served.remove(slug);
        Ok(())
      })
      .await
  }

  async fn served_slugs(&self, conversation: ConversationId) -> Result<HashSet<String>> {
    Ok(self.read(conversation, |r| r.served.keys().cloned().collect()).await)
  }

  async fn reset_served(&self, conversation: ConversationId) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.served.clear();
        Ok(())
      })
      .await
  }

  async fn mark_answered(&self, conversation: ConversationId, question: &Question, at: DateTime<Utc>) -> Result<()> {
    self
      .mutate(conversation, |r| {
        r.answered
          .entry(question.slug.clone())
          .and_modify(|e| {
            e.attempts += 1;
            e.last_answered_at = at;
            e.question = question.clone();
          })
          .or_insert_with(|| AnsweredEntry {
            question: question.clone(),
            first_answered_at: at,
            last_answered_at: at,
            attempts: 1,
          });
        Ok(())
      })
      .await
  }

  async fn list_answered(&self, conversation: ConversationId, limit: usize) -> Result<Vec<AnsweredEntry>> {
    let limit = normalize_limit(limit);
    let mut entries = self.read(conversation, |r| r.answered.values().cloned().collect::<Vec<_>>()).await;
    entries.sort_by(|a, b| {
      b.last_answered_at
        .cmp(&a.last_answered_at)
        .then_with(|| a.question.slug.cmp(&b.question.slug))
    });
    entries.truncate(limit);
    Ok(entries)
  }

  async fn answered(&self, conversation: ConversationId, slug: &str) -> Result<AnsweredEntry> {
    self
      .read(conversation, |r| r.answered.get(slug).cloned())
      .await
      .ok_or_else(|| BotError::NotFound(slug.to_string()))
  }

  async fn delete_answered(&self, conversation: ConversationId, slug: &str) -> Result<()> {
    // Check under the read lock first so a miss never creates a record.
    if !self.read(conversation, |r| r.answered.contains_key(slug)).await {
      return Err(BotError::NotFound(slug.to_string()));
    }
    self
      .mutate(conversation, |r| match r.answered.remove(slug) {
        Some(_) => Ok(()),
        None => Err(BotError::NotFound(slug.to_string())),
      })
      .await
  }

  async fn daily_enabled(&self) -> Result<Vec<ConversationSettings>> {
    let guard = self.records.read().await;
    let mut out: Vec<ConversationSettings> =
      guard.values().filter(|r| r.settings.daily_enabled).map(|r| r.settings.clone()).collect();
    out.sort_by_key(|s| s.id);
    Ok(out)
  }
}
