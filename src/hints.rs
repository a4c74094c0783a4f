//! Hint phrasing detection and the heuristic hint text.

use crate::domain::{Difficulty, Question};

const EXACT_PHRASES: &[&str] =
  &["hint", "hint please", "need hint", "need a hint", "give me a hint", "can i get a hint", "another hint"];
const PREFIXES: &[&str] = &["hint:", "hint ", "give me a hint ", "can i get a hint "];

/// Returns the learner context (possibly empty) when `raw` asks for a hint.
pub fn parse_hint_request(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  let lower = trimmed.to_lowercase();
  if EXACT_PHRASES.contains(&lower.as_str()) {
    return Some(String::new());
  }
  for prefix in PREFIXES {
    if lower.starts_with(prefix) {
      // Lowercasing can shift byte offsets for non-ASCII input; slice by chars.
      let rest: String = trimmed.chars().skip(prefix.chars().count()).collect();
      let context = rest.trim().trim_matches(|c| matches!(c, '-' | ':' | ',' | '.' | ' '));
      return Some(context.to_string());
    }
  }
  None
}

pub fn fallback_hint(question: &Question, learner_context: &str) -> String {
  let mut lines = vec![
    "## Direction",
    "- Track the minimum state needed to make each next decision.",
    "- Choose the simplest structure that supports O(1) updates/lookups when possible.",
    "- Validate with one normal case and one edge case before finalizing.",
    "",
    "## Pseudocode",
    "```text",
    "initialize state",
    "for each item in input:",
    "  update state",
    "  if success condition: return result",
    "return fallback",
    "```",
  ];
  if question.difficulty == Difficulty::Hard {
    lines.extend(["", "## Hard Focus", "- Compare one baseline and one optimized approach before committing."]);
  }
  if !learner_context.trim().is_empty() {
    lines.extend([
      "",
      "## Based On Your Context",
      "- You are likely close. Tighten your invariant and termination condition.",
    ]);
  }
  lines.join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exact_phrases_have_no_context() {
    assert_eq!(parse_hint_request("Hint please"), Some(String::new()));
    assert_eq!(parse_hint_request("  need a hint "), Some(String::new()));
  }

  #[test]
  fn prefixes_keep_the_remainder() {
    assert_eq!(parse_hint_request("hint: stuck on duplicates."), Some("stuck on duplicates".into()));
    assert_eq!(parse_hint_request("Can I get a hint - Two pointers?"), Some("Two pointers?".into()));
  }

  #[test]
  fn ordinary_answers_are_not_hints() {
    assert_eq!(parse_hint_request("hints are for the weak"), None);
    assert_eq!(parse_hint_request("use a stack"), None);
    assert_eq!(parse_hint_request(""), None);
  }

  #[test]
  fn fallback_hint_sections() {
    let q = Question { slug: "s".into(), title: "S".into(), difficulty: Difficulty::Hard, url: String::new() };
    let text = fallback_hint(&q, "my idea");
    assert!(text.contains("```text"));
    assert!(text.contains("## Hard Focus"));
    assert!(text.contains("## Based On Your Context"));
  }
}
