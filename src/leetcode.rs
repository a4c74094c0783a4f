//! LeetCode-backed question bank.
//!
//! The free problem list comes from the public problems API and is cached for a
//! configurable TTL. Problem statements come from the GraphQL `questionPrompt`
//! query and are converted from HTML to the loose structured text the renderer
//! understands.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::header::{CONTENT_TYPE, REFERER, USER_AGENT};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::domain::{Difficulty, Question};
use crate::error::{BotError, Result};
use crate::ports::QuestionBank;
use crate::selection::choose_unseen;

pub const DEFAULT_PROBLEMS_URL: &str = "https://leetcode.com/api/problems/all/";
pub const DEFAULT_GRAPHQL_URL: &str = "https://leetcode.com/graphql";
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const UA: &str = "leetcoach-backend/0.1";

const QUESTION_PROMPT_QUERY: &str = r#"
query questionPrompt($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    content
  }
}"#;

#[derive(Deserialize)]
struct ProblemList {
  #[serde(default)]
  stat_status_pairs: Vec<ProblemPair>,
}

#[derive(Deserialize)]
struct ProblemPair {
  #[serde(default)]
  paid_only: bool,
  stat: ProblemStat,
  #[serde(default)]
  difficulty: ProblemDifficulty,
}

#[derive(Deserialize)]
struct ProblemStat {
  #[serde(default, rename = "question__title")]
  title: String,
  #[serde(default, rename = "question__title_slug")]
  slug: String,
}

#[derive(Deserialize, Default)]
struct ProblemDifficulty {
  #[serde(default)]
  level: u8,
}

#[derive(Deserialize)]
struct GraphqlResponse {
  #[serde(default)]
  data: Option<GraphqlData>,
  #[serde(default)]
  errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlData {
  question: Option<GraphqlQuestion>,
}

#[derive(Deserialize)]
struct GraphqlQuestion {
  #[serde(default)]
  content: Option<String>,
}

#[derive(Deserialize)]
struct GraphqlError {
  message: String,
}

/// Free questions only; paid and malformed entries are dropped.
pub fn parse_problem_list(body: &str) -> Result<Vec<Question>> {
  let parsed: ProblemList =
    serde_json::from_str(body).map_err(|e| BotError::Bank(format!("decode leetcode response: {}", e)))?;
  let questions: Vec<Question> = parsed
    .stat_status_pairs
    .into_iter()
    .filter(|p| !p.paid_only)
    .filter_map(|p| {
      let slug = p.stat.slug.trim().to_string();
      let title = p.stat.title.trim().to_string();
      if slug.is_empty() || title.is_empty() {
        return None;
      }
      Some(Question {
        url: Question::problem_url(&slug),
        slug,
        title,
        difficulty: Difficulty::from_level(p.difficulty.level),
      })
    })
    .collect();
  if questions.is_empty() {
    return Err(BotError::Bank("leetcode returned no free questions".into()));
  }
  Ok(questions)
}

struct CachedList {
  fetched_at: Instant,
  questions: Arc<Vec<Question>>,
}

#[derive(Clone)]
pub struct LeetCodeClient {
  client: reqwest::Client,
  problems_url: String,
  graphql_url: String,
  ttl: Duration,
  cache: Arc<RwLock<Option<CachedList>>>,
}

impl LeetCodeClient {
  pub fn new(ttl: Duration) -> Result<Self> {
    Self::with_endpoints(DEFAULT_PROBLEMS_URL, DEFAULT_GRAPHQL_URL, ttl)
  }

  pub fn with_endpoints(problems_url: &str, graphql_url: &str, ttl: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(HTTP_TIMEOUT)
      .build()
      .map_err(|e| BotError::Bank(format!("build http client: {}", e)))?;
    Ok(Self {
      client,
      problems_url: problems_url.to_string(),
      graphql_url: graphql_url.to_string(),
      ttl,
      cache: Arc::new(RwLock::new(None)),
    })
  }

  async fn questions(&self) -> Result<Arc<Vec<Question>>> {
    {
      let cache = self.cache.read().await;
      if let Some(c) = cache.as_ref() {
        if c.fetched_at.elapsed() < self.ttl {
          return Ok(c.questions.clone());
        }
      }
    }

    let fresh = Arc::new(self.fetch_list().await?);
    *self.cache.write().await = Some(CachedList { fetched_at: Instant::now(), questions: fresh.clone() });
    Ok(fresh)
  }

  #[instrument(level = "info", skip(self))]
  async fn fetch_list(&self) -> Result<Vec<Question>> {
    let started = Instant::now();
    let res = self
      .client
      .get(&self.problems_url)
      .header(USER_AGENT, UA)
      .send()
      .await
      .map_err(|e| BotError::Bank(format!("fetch leetcode questions: {}", e)))?;
    if !res.status().is_success() {
      return Err(BotError::Bank(format!("leetcode status {}", res.status())));
    }
    let body = res.text().await.map_err(|e| BotError::Bank(format!("read leetcode response: {}", e)))?;
    let questions = parse_problem_list(&body)?;
    info!(target: "leetcoach", count = questions.len(), elapsed = ?started.elapsed(), "LeetCode problem list refreshed");
    Ok(questions)
  }
}

#[async_trait]
impl QuestionBank for LeetCodeClient {
  async fn random(&self, excluding: &HashSet<String>) -> Result<Question> {
    let all = self.questions().await?;
    choose_unseen(&all, excluding)
  }

  async fn all(&self) -> Result<Vec<Question>> {
    Ok(self.questions().await?.as_ref().clone())
  }

  #[instrument(level = "debug", skip(self))]
  async fn prompt(&self, slug: &str) -> Result<String> {
    let slug = slug.trim();
    if slug.is_empty() {
      return Err(BotError::Bank("slug is empty".into()));
    }
    let payload = serde_json::json!({
      "operationName": "questionPrompt",
      "query": QUESTION_PROMPT_QUERY,
      "variables": { "titleSlug": slug },
    });

    let res = self
      .client
      .post(&self.graphql_url)
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .header(REFERER, Question::problem_url(slug))
      .json(&payload)
      .send()
      .await
      .map_err(|e| BotError::Bank(format!("fetch question prompt: {}", e)))?;
    if !res.status().is_success() {
      return Err(BotError::Bank(format!("leetcode graphql status {}", res.status())));
    }

    let parsed: GraphqlResponse =
      res.json().await.map_err(|e| BotError::Bank(format!("decode question prompt: {}", e)))?;
    if let Some(err) = parsed.errors.first() {
      return Err(BotError::Bank(format!("leetcode graphql error: {}", err.message)));
    }
    let html = parsed
      .data
      .and_then(|d| d.question)
      .and_then(|q| q.content)
      .unwrap_or_default();
    match html_to_text(&html) {
      t if t.is_empty() => Err(BotError::Bank(format!("question prompt for {} is empty", slug))),
      t => Ok(t),
    }
  }
}

// ---------- HTML → structured text ----------

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").expect("br regex"));
static BLOCK_CLOSE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)</\s*(p|div|section|article|pre|blockquote|h[1-6]|tr)\s*>").expect("block regex")
});
static LIST_ITEM_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*li\s*>").expect("li regex"));
static LIST_CONTAINER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?\s*(ul|ol)\s*>").expect("list regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("space regex"));
static MANY_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("newline regex"));
static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity regex"));

/// Block-level tags become line breaks, list items become `- ` bullets, the
/// rest of the markup is dropped and entities decoded.
pub fn html_to_text(content: &str) -> String {
  let text = content.trim();
  if text.is_empty() {
    return String::new();
  }

  let text = LINE_BREAK.replace_all(text, "\n");
  let text = BLOCK_CLOSE.replace_all(&text, "\n\n");
  let text = LIST_ITEM_OPEN.replace_all(&text, "\n- ");
  let text = LIST_CONTAINER.replace_all(&text, "\n");
  let text = ANY_TAG.replace_all(&text, "");
  let text = decode_entities(&text);

  let lines: Vec<String> = text
    .split('\n')
    .map(|line| MULTI_SPACE.replace_all(line.trim(), " ").into_owned())
    .collect();
  let joined = lines.join("\n");
  MANY_NEWLINES.replace_all(&joined, "\n\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
  ENTITY
    .replace_all(text, |caps: &Captures| {
      let name = &caps[1];
      let decoded = if let Some(num) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
      } else if let Some(num) = name.strip_prefix('#') {
        num.parse::<u32>().ok().and_then(char::from_u32)
      } else {
        named_entity(name)
      };
      match decoded {
        Some(c) => c.to_string(),
        None => caps[0].to_string(),
      }
    })
    .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
  Some(match name {
    "amp" => '&',
    "lt" => '<',
    "gt" => '>',
    "quot" => '"',
    "apos" => '\'',
    "nbsp" => ' ',
    "le" => '≤',
    "ge" => '≥',
    "ne" => '≠',
    "times" => '×',
    "minus" => '−',
    "hellip" => '…',
    "rarr" => '→',
    "larr" => '←',
    _ => return None,
  })
}
