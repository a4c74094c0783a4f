//! Application state: the wired practice service, command router, daily dispatcher,
//! and the secrets the HTTP layer checks.
//!
//! This module owns the choice of collaborators:
//!   - question bank: the `[[questions]]` table of the bot config file if present,
//!     otherwise the LeetCode API
//!   - coach: OpenAI when configured, otherwise none (heuristic grading and hints)
//!   - store: in-memory, optionally snapshotted to a JSON file

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{info, instrument, warn};

use crate::bank::LocalBank;
use crate::commands::Router;
use crate::config::{load_bot_config, AppConfig, BotFileConfig};
use crate::error::Result;
use crate::leetcode::LeetCodeClient;
use crate::markup::Renderer;
use crate::openai::OpenAiCoach;
use crate::ports::{Coach, QuestionBank, Store, Transport};
use crate::scheduler::DailyDispatcher;
use crate::session::{DailyDefaults, PracticeService};
use crate::store::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub dispatcher: Arc<DailyDispatcher>,
    pub webhook_secret: String,
    pub cron_secret: String,
    pub daily_scheduling_enabled: bool,
}

/// HTTP-facing settings, split out so tests can build state without env.
#[derive(Clone, Debug)]
pub struct Secrets {
    pub webhook: String,
    pub cron: String,
    pub daily_scheduling_enabled: bool,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn from_parts(service: Arc<PracticeService>, allowed_usernames: &[String], default_tz: Tz, secrets: Secrets) -> Self {
        let dispatcher = Arc::new(DailyDispatcher::new(service.clone(), default_tz));
        let router = Arc::new(Router::new(service, allowed_usernames));
        Self {
            router,
            dispatcher,
            webhook_secret: secrets.webhook,
            cron_secret: secrets.cron,
            daily_scheduling_enabled: secrets.daily_scheduling_enabled,
        }
    }

    /// Build state from config: load the bot config file, pick bank/coach/store.
    #[instrument(level = "info", skip_all)]
    pub async fn build(cfg: &AppConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let file_cfg = match &cfg.bot_config_path {
            Some(path) => load_bot_config(path)?,
            None => BotFileConfig::default(),
        };

        let bank: Arc<dyn QuestionBank> = if file_cfg.questions.is_empty() {
            info!(target: "leetcoach", ttl_secs = cfg.question_cache.as_secs(), "Using LeetCode question bank");
            Arc::new(LeetCodeClient::new(cfg.question_cache)?)
        } else {
            Arc::new(LocalBank::from_config(&file_cfg.questions)?)
        };

        let coach: Option<Arc<dyn Coach>> = match &cfg.ai {
            Some(ai) => {
                info!(target: "leetcoach", model = %ai.model, "OpenAI coach enabled");
                Some(Arc::new(OpenAiCoach::new(ai, file_cfg.prompts.clone())?))
            }
            None => {
                warn!(target: "leetcoach", "OpenAI coach disabled; using heuristic grading and hints");
                None
            }
        };

        let tz_name = cfg.timezone_name();
        let store: Arc<dyn Store> = match &cfg.store_snapshot_path {
            Some(path) => {
                info!(target: "leetcoach", path = %path.display(), "Using snapshotted in-memory store");
                Arc::new(MemoryStore::with_snapshot(&cfg.daily_default_time, tz_name, path).await?)
            }
            None => Arc::new(MemoryStore::new(&cfg.daily_default_time, tz_name)),
        };

        let defaults = DailyDefaults { time: cfg.daily_default_time.clone(), timezone: tz_name.to_string() };
        let service = PracticeService::new(transport, bank, store, Renderer::new(cfg.markup), defaults)
            .with_coach(coach)
            .with_topic_prompt(cfg.topic_prompt);

        info!(
            target: "leetcoach",
            allowed = cfg.allowed_usernames.len(),
            markup = %cfg.markup,
            topic_prompt = cfg.topic_prompt,
            daily_scheduling = cfg.daily_scheduling_enabled,
            "Application state ready"
        );

        Ok(Self::from_parts(
            Arc::new(service),
            &cfg.allowed_usernames,
            cfg.daily_timezone,
            Secrets {
                webhook: cfg.webhook_secret.clone(),
                cron: cfg.cron_secret.clone(),
                daily_scheduling_enabled: cfg.daily_scheduling_enabled,
            },
        ))
    }
}
