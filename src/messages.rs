//! Outgoing message composition.
//!
//! Rich messages (question, evaluation, hint) go through the `Renderer` so the
//! same code serves either markup dialect. Everything else is plain text.

use std::fmt;

use crate::domain::{AnsweredEntry, Question};
use crate::markup::Renderer;

pub const QUESTION_PROMPT_LIMIT: usize = 1500;
pub const FEEDBACK_LIMIT: usize = 650;
pub const GUIDANCE_LIMIT: usize = 700;
pub const HINT_LIMIT: usize = 700;

pub const INTRO_RANDOM: &str = "Here is your random LeetCode question:";
pub const INTRO_SKIP: &str = "Skipped. Here is another LeetCode question:";
pub const INTRO_REVISE: &str = "Revision question from your history:";
pub const INTRO_DAILY: &str = "Daily LeetCode challenge:";

pub const HISTORY_RESET_NOTE: &str = "Question history exhausted and reset to allow new picks.";
pub const PROMPT_UNAVAILABLE: &str = "Could not load the full question statement right now.";

pub const NO_ACTIVE_QUESTION: &str = "No active question. Use /lc first.";
pub const NO_ACTIVE_TO_SKIP: &str = "No active question to skip. Use /lc first.";
pub const NO_ACTIVE_PRACTICE: &str = "No active practice mode. Use /lc when you want a question.";
pub const DONE_SAVED: &str = "Marked as done and saved to your seen/revision history. Send /lc for another question.";
pub const EXITED: &str = "Exited practice mode. Send /lc when you want another question.";
pub const STATUS_SAVED: &str = "Correct. Saved to history.";
pub const STATUS_NOT_SAVED: &str = "Not saved yet. Improve and resubmit, or use /done.";
pub const NO_FEEDBACK: &str = "No feedback provided.";
pub const TOPIC_PROMPT: &str = "Which topic would you like? Reply with a topic such as array, tree or dp, or send \"random\".";
pub const NO_TOPIC_MATCH: &str = "No unseen questions found for that topic. Try another topic or send /lc random.";
pub const BANK_EMPTY: &str = "No questions are available right now. Please try again later.";
pub const DELETE_NOT_FOUND: &str =
  "I couldn't find that slug in your revised list. Use /answered to see available slugs.";
pub const REVISE_NOT_FOUND: &str =
  "I couldn't find that slug in your answered history. Use /answered to see available slugs.";
pub const NO_ANSWERED: &str = "No answered questions yet. Use /lc and either solve correctly or /done.";
pub const NOTHING_TO_REVISE: &str =
  "No answered questions to revise yet. Complete one first with /lc and /done (or a correct attempt).";
pub const DAILY_OFF: &str = "Daily question is OFF. Use /daily_on to re-enable.";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /help to see available commands.";
pub const NOT_ALLOWED: &str = "You are not allowed to use this bot.";

/// Who produced a review or hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
  Ai,
  Heuristic,
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Source::Ai => f.write_str("AI"),
      Source::Heuristic => f.write_str("Heuristic"),
    }
  }
}

fn title_line(r: &Renderer, q: &Question) -> String {
  format!("{} {}", r.bold(&q.title), r.escape(&format!("({})", q.difficulty)))
}

pub fn question_message(r: &Renderer, intro: &str, note: &str, q: &Question, prompt: &str) -> String {
  let prompt = match prompt.trim() {
    "" => format!("{}\nLeetCode URL: {}", PROMPT_UNAVAILABLE, q.url),
    p => p.to_string(),
  };

  let mut lines: Vec<String> = Vec::with_capacity(12);
  if !intro.trim().is_empty() {
    lines.push(r.bold(&format!("🧩 {}", intro.trim())));
  }
  if !note.trim().is_empty() {
    lines.push(r.italic(note.trim()));
  }
  lines.push(title_line(r, q));
  lines.push(format!("{} {}", r.escape("Link:"), r.link(&q.url, &q.url)));
  lines.push(String::new());
  lines.push(r.bold("Problem"));
  lines.push(String::new());
  lines.push(r.render_truncated(&prompt, QUESTION_PROMPT_LIMIT));
  lines.push(String::new());
  lines.push(r.bold("Next"));
  lines.push(r.escape("Reply with your approach. Use /hint for guidance, /skip for another question, or /exit."));
  lines.join("\n")
}

pub fn evaluation_message(
  r: &Renderer,
  q: &Question,
  score: i32,
  source: Source,
  feedback: &str,
  guidance: &str,
  status: &str,
) -> String {
  let lines = [
    r.bold("🧠 Evaluation"),
    title_line(r, q),
    format!("{} {} {}", r.escape("Score:"), r.bold(&format!("{}/10", score)), r.escape(&format!("• Source: {}", source))),
    String::new(),
    r.bold("Feedback"),
    String::new(),
    r.render_truncated(feedback, FEEDBACK_LIMIT),
    String::new(),
    r.bold("Next Steps"),
    String::new(),
    r.render_truncated(guidance, GUIDANCE_LIMIT),
    String::new(),
    r.bold("Status"),
    String::new(),
    r.escape(status.trim()),
    String::new(),
    r.escape("Send another attempt, /hint, /skip, /done, /exit, or /lc."),
  ];
  lines.join("\n")
}

pub fn hint_message(r: &Renderer, q: &Question, source: Source, hint: &str) -> String {
  let lines = [
    r.bold("💡 Hint"),
    title_line(r, q),
    r.escape(&format!("Source: {}", source)),
    String::new(),
    r.render_truncated(hint, HINT_LIMIT),
    String::new(),
    r.escape("Try updating your approach, then send it for evaluation."),
  ];
  lines.join("\n")
}

pub fn answered_list(entries: &[AnsweredEntry]) -> String {
  let mut lines = Vec::with_capacity(entries.len() + 2);
  lines.push("Answered questions (latest first):".to_string());
  for (i, e) in entries.iter().enumerate() {
    lines.push(format!(
      "{}. {} ({}) | slug: {} | attempts: {} | last: {}",
      i + 1,
      e.question.title,
      e.question.difficulty,
      e.question.slug,
      e.attempts,
      e.last_answered_at.format("%Y-%m-%d"),
    ));
  }
  lines.push("Use /revise <slug> to revisit a specific question, or /revise for a random one.".to_string());
  lines.join("\n")
}

pub fn daily_on(time: &str, tz_label: &str) -> String {
  format!("Daily question is ON at {} {}. Use /daily_off to stop.", time, tz_label)
}

pub fn daily_time_set(time: &str, tz_label: &str) -> String {
  format!("Daily time set to {} {} and notifications are ON.", time, tz_label)
}

pub fn daily_status(enabled: bool, time: &str, tz_label: &str) -> String {
  format!(
    "Daily status: {}\nTime: {}\nTimezone: {}",
    if enabled { "ON" } else { "OFF" },
    time,
    tz_label
  )
}

pub fn deleted(slug: &str) -> String {
  format!("Deleted \"{}\" from revised history and seen set.", slug)
}

pub fn help_text(tz_label: &str, default_time: &str) -> String {
  format!(
    "Commands:\n\
     /lc [topic] - Get a random LeetCode question, optionally matching a topic\n\
     /hint [context] - Get a hint for the current question\n\
     /done - Mark current question complete and save it to seen/revision history\n\
     /skip - Skip the current question without adding it to seen history\n\
     /exit - Exit active /lc practice mode\n\
     /delete <slug> - Remove a question from revised history and seen set\n\
     /answered [limit] - List previously answered questions\n\
     /history [limit] - Alias of /answered\n\
     /revise [slug] - Revisit an answered question (random if slug omitted)\n\
     /daily_on [HH:MM] - Enable daily question in {tz} (default {time})\n\
     /daily_off - Disable daily question\n\
     /daily_time HH:MM - Set daily time in {tz} and enable\n\
     /daily_status - Show current daily schedule\n\
     \n\
     After /lc, send your solution idea in words/pseudocode and I will evaluate it with AI (fallback: heuristic).",
    tz = tz_label,
    time = default_time,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;
  use crate::markup::MarkupKind;
  use chrono::{TimeZone, Utc};

  fn q() -> Question {
    Question {
      slug: "two-sum".into(),
      title: "Two Sum".into(),
      difficulty: Difficulty::Easy,
      url: Question::problem_url("two-sum"),
    }
  }

  #[test]
  fn missing_prompt_falls_back_to_url() {
    let r = Renderer::new(MarkupKind::Html);
    let msg = question_message(&r, INTRO_RANDOM, "", &q(), "  ");
    assert!(msg.contains(PROMPT_UNAVAILABLE));
    assert!(msg.contains("LeetCode URL: https://leetcode.com/problems/two-sum/"));
    assert!(msg.starts_with("<b>🧩 Here is your random LeetCode question:</b>"));
  }

  #[test]
  fn note_is_rendered_in_both_dialects() {
    for kind in [MarkupKind::Html, MarkupKind::MarkdownV2] {
      let r = Renderer::new(kind);
      let msg = question_message(&r, INTRO_RANDOM, HISTORY_RESET_NOTE, &q(), "Find two numbers.");
      assert!(msg.contains("Question history exhausted and reset"), "{}", kind);
    }
  }

  #[test]
  fn markdown_v2_evaluation_escapes_score_line() {
    let r = Renderer::new(MarkupKind::MarkdownV2);
    let msg = evaluation_message(&r, &q(), 9, Source::Heuristic, "ok.", "plan.", STATUS_SAVED);
    assert!(msg.contains("*9/10*"));
    assert!(msg.contains("\\(Easy\\)"));
    assert!(msg.contains("Correct\\. Saved to history\\."));
  }

  #[test]
  fn answered_list_lines() {
    let at = Utc.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap();
    let entries = vec![AnsweredEntry { question: q(), first_answered_at: at, last_answered_at: at, attempts: 2 }];
    let text = answered_list(&entries);
    assert!(text.contains("1. Two Sum (Easy) | slug: two-sum | attempts: 2 | last: 2026-02-14"));
  }
}
