//! Deterministic answer grading used when the coach is absent or fails.
//!
//! Purely lexical: word count plus keyword families. It grades a description of
//! a solution, never runs code.

use crate::domain::{Difficulty, Question, Review};

/// Minimum score that persists a question as answered.
pub const PASS_THRESHOLD: i32 = 8;

const BASE_SCORE: i32 = 2;
const MIN_SCORE: i32 = 1;
const MAX_SCORE: i32 = 10;

const STRUCTURE_TOKENS: &[&str] =
  &["for ", "while ", "if ", "return", "function", "def ", "map[", "[]", "stack", "queue"];
const COMPLEXITY_TOKENS: &[&str] = &["o(", "time complexity", "space complexity"];
const EDGE_CASE_TOKENS: &[&str] = &["empty", "null", "boundary", "single", "duplicate", "overflow", "underflow"];

const HEURISTIC_NOTE: &str = "Note: This is heuristic grading from text/pseudocode, not code execution.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grade {
  pub score: i32,
  pub feedback: String,
}

pub fn clamp_score(score: i32) -> i32 {
  score.clamp(MIN_SCORE, MAX_SCORE)
}

pub fn passes(score: i32) -> bool {
  score >= PASS_THRESHOLD
}

pub fn verdict(score: i32) -> &'static str {
  if score >= 8 {
    "Strong"
  } else if score >= 5 {
    "Decent"
  } else {
    "Needs work"
  }
}

fn has_any(haystack: &str, needles: &[&str]) -> bool {
  needles.iter().any(|n| haystack.contains(n))
}

pub fn grade_answer(answer: &str, difficulty: Difficulty) -> Grade {
  let text = answer.trim();
  let lower = text.to_lowercase();
  let words = text.split_whitespace().count();

  let mut score = BASE_SCORE;
  let mut lines: Vec<&str> = Vec::with_capacity(6);

  if words >= 35 {
    score += 2;
    lines.push("Coverage is good and detailed.");
  } else if words >= 15 {
    score += 1;
    lines.push("Approach is partially explained.");
  } else {
    lines.push("Explanation is short; add more detail on steps.");
  }

  if has_any(&lower, STRUCTURE_TOKENS) {
    score += 2;
    lines.push("Pseudocode or algorithm structure is present.");
  } else {
    lines.push("Add pseudocode structure (loops, conditions, return).");
  }

  let mentions_complexity = has_any(&lower, COMPLEXITY_TOKENS);
  if mentions_complexity {
    score += 2;
    lines.push("Complexity considerations are included.");
  } else {
    lines.push("Include time and space complexity to strengthen your answer.");
  }

  if has_any(&lower, EDGE_CASE_TOKENS) {
    score += 1;
    lines.push("Edge cases were considered.");
  } else {
    lines.push("Mention edge cases to improve robustness.");
  }

  if difficulty == Difficulty::Hard && !mentions_complexity {
    score -= 1;
    lines.push("For Hard questions, complexity analysis is essential.");
  }

  let score = clamp_score(score);
  let feedback = format!("Verdict: {}\n{}\n{}", verdict(score), lines.join("\n"), HEURISTIC_NOTE);
  Grade { score, feedback }
}

/// Coaches sometimes omit the score; an explicit 0 is read as a neutral 5.
pub fn normalize_coach_review(mut review: Review) -> Review {
  if review.score == 0 {
    review.score = 5;
  }
  review.score = clamp_score(review.score);
  review
}

/// Generic next-step plan, used when the coach gives no guidance.
pub fn fallback_guidance(question: &Question, learner_context: &str) -> String {
  let mut out = String::from(
    "## Plan\n\
     1. Restate input/output and constraints.\n\
     2. Pick the core pattern (map, stack, two-pointers, DP, graph).\n\
     3. Validate with one normal case and one edge case.\n\
     4. State time/space complexity.\n",
  );
  if question.difficulty == Difficulty::Hard {
    out.push_str("\n## Hard Focus\n- Compare two strategies and justify why yours is optimal.");
  }
  if !learner_context.trim().is_empty() {
    out.push_str("\n## Focus\n- Tighten your state definition and loop invariant.");
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn q(difficulty: Difficulty) -> Question {
    Question { slug: "x".into(), title: "X".into(), difficulty, url: String::new() }
  }

  #[test]
  fn empty_answer_gets_base_score() {
    let g = grade_answer("   ", Difficulty::Easy);
    assert_eq!(g.score, BASE_SCORE);
    assert!(g.feedback.starts_with("Verdict: Needs work"));
    assert!(g.feedback.ends_with(HEURISTIC_NOTE));
  }

  #[test]
  fn hard_without_complexity_is_clamped_to_one() {
    assert_eq!(grade_answer("", Difficulty::Hard).score, 1);
  }

  #[test]
  fn thorough_answer_is_strong() {
    let answer = "Use a hash map from value to index. for each element, if target minus value \
                  is already in the map return both indices. Time complexity O(n), space O(n). \
                  Handle the empty input and duplicate values.";
    let g = grade_answer(answer, Difficulty::Easy);
    assert!(g.score >= PASS_THRESHOLD, "score {}", g.score);
    assert!(g.feedback.starts_with("Verdict: Strong"));
    assert!(g.feedback.contains("Edge cases were considered."));
  }

  #[test]
  fn score_stays_in_range() {
    let huge = "for while if return o( time complexity empty null ".repeat(40);
    for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard, Difficulty::Unknown] {
      let g = grade_answer(&huge, d);
      assert!((1..=10).contains(&g.score));
      let g = grade_answer("x", d);
      assert!((1..=10).contains(&g.score));
    }
  }

  #[test]
  fn hard_penalty_is_waived_by_any_complexity_mention() {
    let with = grade_answer("space complexity is constant", Difficulty::Hard);
    let without = grade_answer("space is constant", Difficulty::Hard);
    assert!(!with.feedback.contains("essential"));
    assert!(without.feedback.contains("essential"));
  }

  #[test]
  fn coach_review_zero_means_neutral() {
    let r = normalize_coach_review(Review { score: 0, ..Review::default() });
    assert_eq!(r.score, 5);
    let r = normalize_coach_review(Review { score: 42, ..Review::default() });
    assert_eq!(r.score, 10);
  }

  #[test]
  fn guidance_adds_sections() {
    let plain = fallback_guidance(&q(Difficulty::Easy), "");
    assert!(plain.starts_with("## Plan"));
    assert!(!plain.contains("Hard Focus"));
    let hard = fallback_guidance(&q(Difficulty::Hard), "stuck on loop");
    assert!(hard.contains("## Hard Focus"));
    assert!(hard.contains("## Focus"));
  }

  #[test]
  fn verdict_bands() {
    assert_eq!(verdict(8), "Strong");
    assert_eq!(verdict(5), "Decent");
    assert_eq!(verdict(4), "Needs work");
  }
}
