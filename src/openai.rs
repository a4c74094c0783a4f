//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key or the learner's answer.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{AiConfig, Prompts};
use crate::domain::{Question, Review};
use crate::error::{BotError, Result};
use crate::ports::{Coach, QuestionFormatter};
use crate::util::{fill_template, trunc_for_log};

const UA: &str = "leetcoach-backend/0.1";

#[derive(Clone)]
pub struct OpenAiCoach {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
  prompts: Prompts,
}

/// The model sometimes answers `7.5` or `"7"`; accept any of them.
#[derive(Deserialize)]
struct ReviewOut {
  #[serde(default)]
  score: serde_json::Value,
  #[serde(default)]
  feedback: String,
  #[serde(default)]
  guidance: String,
}

impl ReviewOut {
  fn into_review(self) -> Review {
    let score = match &self.score {
      serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
      serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
      _ => 0.0,
    };
    Review { score: score.round() as i32, feedback: self.feedback, guidance: self.guidance }
  }
}

impl OpenAiCoach {
  pub fn new(cfg: &AiConfig, prompts: Prompts) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(cfg.timeout)
      .build()
      .map_err(|e| BotError::Config(format!("openai client: {}", e)))?;
    Ok(Self {
      client,
      api_key: cfg.api_key.clone(),
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      prompts,
    })
  }

  fn question_vars<'a>(question: &'a Question) -> [(&'static str, &'a str); 3] {
    [("title", question.title.as_str()), ("difficulty", question.difficulty.as_str()), ("url", question.url.as_str())]
  }

  async fn post(&self, req: &ChatCompletionRequest) -> Result<String> {
    let url = format!("{}/chat/completions", self.base_url);
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(req)
      .send()
      .await
      .map_err(|e| BotError::Coach(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(BotError::Coach(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| BotError::Coach(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "leetcoach", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();
    Ok(text)
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_plain(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
    let req = ChatCompletionRequest::new(&self.model, system, user, temperature, None);
    let start = Instant::now();
    let result = self.post(&req).await;
    let elapsed = start.elapsed();
    match &result {
      Ok(text) => info!(target: "leetcoach", ?elapsed, response_len = text.len(), "Model response received"),
      Err(e) => error!(target: "leetcoach", ?elapsed, error = %e, "Model call failed"),
    }
    result
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(&self, system: &str, user: &str, temperature: f32) -> Result<T> {
    let format = Some(ResponseFormat { r#type: "json_object".into() });
    let req = ChatCompletionRequest::new(&self.model, system, user, temperature, format);
    let start = Instant::now();
    let result = self.post(&req).await;
    let elapsed = start.elapsed();
    let text = match result {
      Ok(text) => text,
      Err(e) => {
        error!(target: "leetcoach", ?elapsed, error = %e, "Model call failed");
        return Err(e);
      }
    };
    info!(target: "leetcoach", ?elapsed, response_len = text.len(), "Model response received");
    serde_json::from_str::<T>(strip_code_fence(&text))
      .map_err(|e| BotError::Coach(format!("JSON parse error: {} in {}", e, trunc_for_log(&text, 120))))
  }
}

#[async_trait]
impl Coach for OpenAiCoach {
  #[instrument(level = "info", skip(self, question, answer), fields(slug = %question.slug, answer_len = answer.len()))]
  async fn review(&self, question: &Question, answer: &str) -> Result<Review> {
    let vars = Self::question_vars(question);
    let mut pairs = vars.to_vec();
    pairs.push(("answer", answer));
    let user = fill_template(&self.prompts.review_user_template, &pairs);
    let out: ReviewOut = self.chat_json(&self.prompts.review_system, &user, 0.2).await?;
    Ok(out.into_review())
  }

  #[instrument(level = "info", skip(self, question, learner_context), fields(slug = %question.slug, has_context = !learner_context.is_empty()))]
  async fn hint(&self, question: &Question, learner_context: &str) -> Result<String> {
    let vars = Self::question_vars(question);
    let mut pairs = vars.to_vec();
    pairs.push(("context", learner_context));
    let user = fill_template(&self.prompts.hint_user_template, &pairs);
    self.chat_plain(&self.prompts.hint_system, &user, 0.3).await
  }

  fn formatter(&self) -> Option<&dyn QuestionFormatter> {
    Some(self)
  }
}

#[async_trait]
impl QuestionFormatter for OpenAiCoach {
  #[instrument(level = "info", skip(self, question, raw_prompt), fields(slug = %question.slug, prompt_len = raw_prompt.len()))]
  async fn format_question(&self, question: &Question, raw_prompt: &str) -> Result<String> {
    let vars = Self::question_vars(question);
    let mut pairs = vars.to_vec();
    pairs.push(("prompt", raw_prompt));
    let user = fill_template(&self.prompts.format_user_template, &pairs);
    self.chat_plain(&self.prompts.format_system, &user, 0.0).await
  }
}

/// Models occasionally wrap JSON in a ```json fence despite the response format.
fn strip_code_fence(text: &str) -> &str {
  let t = text.trim();
  let Some(inner) = t.strip_prefix("```") else {
    return t;
  };
  let inner = inner.strip_prefix("json").unwrap_or(inner);
  inner.strip_suffix("```").unwrap_or(inner).trim()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

impl ChatCompletionRequest {
  fn new(model: &str, system: &str, user: &str, temperature: f32, response_format: Option<ResponseFormat>) -> Self {
    Self {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format,
    }
  }
}

#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn review_scores_accept_loose_shapes() {
    let r: ReviewOut = serde_json::from_str(r#"{"score": 7.6, "feedback": "ok"}"#).unwrap();
    assert_eq!(r.into_review().score, 8);
    let r: ReviewOut = serde_json::from_str(r#"{"score": "9", "guidance": "g"}"#).unwrap();
    let review = r.into_review();
    assert_eq!(review.score, 9);
    assert_eq!(review.guidance, "g");
    let r: ReviewOut = serde_json::from_str(r#"{"feedback": "none"}"#).unwrap();
    assert_eq!(r.into_review().score, 0);
  }

  #[test]
  fn fenced_json_is_unwrapped() {
    assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fence(" {\"a\":1} "), "{\"a\":1}");
  }

  #[test]
  fn error_body_message_is_extracted() {
    let body = r#"{"error":{"message":"Invalid API key","type":"auth"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[test]
  fn request_omits_absent_response_format() {
    let req = ChatCompletionRequest::new("m", "s", "u", 0.2, None);
    let json = serde_json::to_value(&req).unwrap();
    assert!(json.get("response_format").is_none());
    assert_eq!(json["messages"][1]["content"], "u");
  }
}
