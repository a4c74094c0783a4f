//! Daily question dispatch.
//!
//! A conversation is due when the local wall clock in its timezone reads its
//! configured `HH:MM` and nothing was sent yet on that local date. Runs are
//! stateless; the `last_daily_sent_on` marker in the store is the only dedupe.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::ConversationSettings;
use crate::error::Result;
use crate::messages::INTRO_DAILY;
use crate::session::PracticeService;

pub const TICK_PERIOD: Duration = Duration::from_secs(60);

/// Accepts `H`, `HH`, `H:MM` and `HH:MM` (24h) and returns canonical `HH:MM`.
pub fn normalize_hhmm(raw: &str) -> Option<String> {
  let raw = raw.trim();
  let (h, m) = match raw.split_once(':') {
    Some((h, m)) => (h, m),
    None => (raw, "00"),
  };
  let digits = |s: &str, min: usize| s.len() >= min && s.len() <= 2 && s.bytes().all(|b| b.is_ascii_digit());
  if !digits(h, 1) || !digits(m, 2) {
    return None;
  }
  let time = NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)?;
  Some(time.format("%H:%M").to_string())
}

/// Unknown or empty zone names fall back to `default`.
pub fn resolve_timezone(name: &str, default: Tz) -> Tz {
  match name.trim() {
    "" => default,
    n => n.parse::<Tz>().unwrap_or_else(|_| {
      warn!(target: "daily", timezone = %n, "Unknown timezone; using default");
      default
    }),
  }
}

/// The local date to mark when `settings` is due at `now`, else `None`.
pub fn is_due(
  settings: &ConversationSettings,
  now: DateTime<Utc>,
  default_tz: Tz,
  default_time: &str,
) -> Option<NaiveDate> {
  if !settings.daily_enabled {
    return None;
  }
  let local = now.with_timezone(&resolve_timezone(&settings.timezone, default_tz));
  let target = if settings.daily_time.is_empty() { default_time } else { settings.daily_time.as_str() };
  if local.format("%H:%M").to_string() != target {
    return None;
  }
  let today = local.date_naive();
  if settings.last_daily_sent_on == Some(today) {
    return None;
  }
  Some(today)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
  /// Conversations that were due.
  pub processed: usize,
  pub sent: usize,
  pub failed: usize,
}

pub struct DailyDispatcher {
  service: Arc<PracticeService>,
  default_tz: Tz,
  /// Held for the length of a run.
  running: Mutex<()>,
}

impl DailyDispatcher {
  pub fn new(service: Arc<PracticeService>, default_tz: Tz) -> Self {
    Self { service, default_tz, running: Mutex::new(()) }
  }

  /// One pass over every daily-enabled conversation. Overlapping calls wait
  /// for the pass in progress, then see its markers.
  ///
  /// Only listing failures are returned; a failed delivery is logged, counted,
  /// and leaves that conversation's marker untouched so a later run can retry.
  #[instrument(level = "info", skip(self))]
  pub async fn run(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
    let _running = self.running.lock().await;
    let store = self.service.store();
    let candidates = store.daily_enabled().await?;
    let default_time = self.service.defaults().time.clone();
    let mut report = DispatchReport::default();

    for settings in &candidates {
      let Some(today) = is_due(settings, now, self.default_tz, &default_time) else {
        continue;
      };
      report.processed += 1;

      if let Err(e) = self.service.deliver_unique(settings.id, INTRO_DAILY, &HashSet::new()).await {
        report.failed += 1;
        error!(target: "daily", conversation = settings.id, error = %e, "Daily delivery failed");
        continue;
      }
      if let Err(e) = store.mark_daily_sent(settings.id, today).await {
        error!(target: "daily", conversation = settings.id, error = %e, "Could not record daily delivery");
      }
      report.sent += 1;
    }

    if report.processed > 0 {
      info!(target: "daily", candidates = candidates.len(), processed = report.processed, sent = report.sent, failed = report.failed, "Daily dispatch finished");
    } else {
      debug!(target: "daily", candidates = candidates.len(), "Nobody due");
    }
    Ok(report)
  }

  /// Runs `run` every `period` on the service clock until the task is aborted.
  pub fn spawn_ticker(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
      info!(target: "daily", period_secs = period.as_secs(), "Internal daily ticker started");
      loop {
        interval.tick().await;
        let now = self.service.clock().now();
        if let Err(e) = self.run(now).await {
          error!(target: "daily", error = %e, "Daily dispatch run failed");
        }
      }
    })
  }
}
