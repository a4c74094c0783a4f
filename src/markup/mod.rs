//! Structured text → transport markup.
//!
//! Input is the loose Markdown-ish text we get from LeetCode prompts, the coach,
//! and our own fallback hints: `#` headings, `-`/`*` bullets, `1.`/`1)` items and
//! fenced code blocks. Output is either Telegram HTML or Telegram MarkdownV2,
//! picked once at startup.
//!
//! Rendering is line oriented. Every line is classified exactly once, in this
//! priority order: fence delimiter, fenced content, blank, heading, bullet,
//! numbered item, plain. Lines are never reordered. Only raw input is rendered;
//! feeding rendered output back in would escape it twice.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

mod html;
mod markdown_v2;

pub use html::{escape_html, Html};
pub use markdown_v2::{escape_markdown_v2, MarkdownV2, MARKDOWN_V2_RESERVED};

/// Appended after a cut. Counted on top of the character budget.
pub const TRUNCATION_NOTICE: &str = "\n\n[truncated]";
const FENCE_CLOSE: &str = "\n```";
const MAX_HEADING_LEVEL: usize = 6;

static NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)[.)]\s+(.*)$").expect("numbered item regex"));
static CODE_LANG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_+\-]").expect("code lang regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind<'a> {
  FenceOpen { lang: &'a str },
  FenceClose,
  InFence(&'a str),
  Blank,
  Heading { level: usize, label: &'a str },
  Bullet(&'a str),
  Numbered { number: &'a str, text: &'a str },
  Plain(&'a str),
}

/// Stateful only in one bit: whether we are inside a fence.
#[derive(Debug, Default)]
pub struct LineClassifier {
  in_fence: bool,
}

impl LineClassifier {
  pub fn classify<'a>(&mut self, line: &'a str) -> LineKind<'a> {
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
      if self.in_fence {
        self.in_fence = false;
        return LineKind::FenceClose;
      }
      self.in_fence = true;
      return LineKind::FenceOpen { lang: rest.trim() };
    }
    if self.in_fence {
      return LineKind::InFence(line);
    }
    if trimmed.is_empty() {
      return LineKind::Blank;
    }
    if let Some((level, label)) = parse_heading(trimmed) {
      return LineKind::Heading { level, label };
    }
    if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
      return LineKind::Bullet(rest.trim());
    }
    if let Some(caps) = NUMBERED_ITEM.captures(trimmed) {
      if let (Some(number), Some(text)) = (caps.get(1), caps.get(2)) {
        return LineKind::Numbered { number: number.as_str(), text: text.as_str().trim() };
      }
    }
    LineKind::Plain(line)
  }

  pub fn in_fence(&self) -> bool {
    self.in_fence
  }
}

fn parse_heading(trimmed: &str) -> Option<(usize, &str)> {
  let level = trimmed.chars().take_while(|c| *c == '#').count();
  if level == 0 || level > MAX_HEADING_LEVEL {
    return None;
  }
  let rest = &trimmed[level..];
  if !rest.starts_with(' ') {
    return None;
  }
  let label = rest.trim();
  if label.is_empty() {
    None
  } else {
    Some((level, label))
  }
}

/// Keeps `[A-Za-z0-9_+-]` and trims leading/trailing `-_+`.
pub fn sanitize_code_language(lang: &str) -> String {
  let kept = CODE_LANG_STRIP.replace_all(lang.trim(), "");
  kept.trim_matches(|c| c == '-' || c == '_' || c == '+').to_string()
}

/// One markup target. Every method takes raw text and does its own escaping.
pub trait Dialect: Send + Sync {
  /// Value for Telegram's `parse_mode`.
  fn parse_mode(&self) -> &'static str;
  fn escape(&self, text: &str) -> String;
  fn bold(&self, text: &str) -> String;
  fn italic(&self, text: &str) -> String;
  fn inline_code(&self, text: &str) -> String;
  fn link(&self, label: &str, url: &str) -> String;
  fn numbered(&self, number: &str, text: &str) -> String;
  fn code_block(&self, lang: &str, lines: &[&str]) -> String;

  fn heading(&self, level: usize, label: &str) -> String {
    let depth = "▸ ".repeat(level.saturating_sub(1));
    self.bold(&format!("{}{}", depth, label))
  }

  fn bullet(&self, text: &str) -> String {
    format!("• {}", self.escape(text))
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupKind {
  #[default]
  Html,
  MarkdownV2,
}

impl FromStr for MarkupKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "html" => Ok(MarkupKind::Html),
      "markdown_v2" | "markdownv2" | "markdown" => Ok(MarkupKind::MarkdownV2),
      other => Err(format!("unknown markup dialect {:?} (expected html or markdown_v2)", other)),
    }
  }
}

impl fmt::Display for MarkupKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MarkupKind::Html => f.write_str("html"),
      MarkupKind::MarkdownV2 => f.write_str("markdown_v2"),
    }
  }
}

/// The "render structured text" capability handed to the session core.
#[derive(Clone)]
pub struct Renderer {
  dialect: Arc<dyn Dialect>,
}

impl fmt::Debug for Renderer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Renderer").field("parse_mode", &self.dialect.parse_mode()).finish()
  }
}

impl Renderer {
  pub fn new(kind: MarkupKind) -> Self {
    match kind {
      MarkupKind::Html => Self { dialect: Arc::new(Html) },
      MarkupKind::MarkdownV2 => Self { dialect: Arc::new(MarkdownV2) },
    }
  }

  pub fn parse_mode(&self) -> &'static str {
    self.dialect.parse_mode()
  }

  pub fn escape(&self, text: &str) -> String {
    self.dialect.escape(text)
  }

  pub fn bold(&self, text: &str) -> String {
    self.dialect.bold(text)
  }

  pub fn italic(&self, text: &str) -> String {
    self.dialect.italic(text)
  }

  pub fn code(&self, text: &str) -> String {
    self.dialect.inline_code(text)
  }

  pub fn link(&self, label: &str, url: &str) -> String {
    self.dialect.link(label, url)
  }

  /// Renders a whole document. An unterminated fence is closed at the end.
  pub fn render(&self, text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let text = normalized.trim();
    if text.is_empty() {
      return String::new();
    }

    let d = self.dialect.as_ref();
    let mut classifier = LineClassifier::default();
    let mut out: Vec<String> = Vec::new();
    let mut code_lang = String::new();
    let mut code: Vec<&str> = Vec::new();

    for line in text.split('\n') {
      match classifier.classify(line) {
        LineKind::FenceOpen { lang } => {
          code_lang = sanitize_code_language(lang);
          code.clear();
        }
        LineKind::FenceClose => {
          out.push(d.code_block(&code_lang, &code));
          code.clear();
          code_lang.clear();
        }
        LineKind::InFence(l) => code.push(l),
        LineKind::Blank => out.push(String::new()),
        LineKind::Heading { level, label } => out.push(d.heading(level, label)),
        LineKind::Bullet(t) => out.push(d.bullet(t)),
        LineKind::Numbered { number, text } => out.push(d.numbered(number, text)),
        LineKind::Plain(l) => out.push(d.escape(l)),
      }
    }

    if classifier.in_fence() {
      out.push(d.code_block(&code_lang, &code));
    }

    out.join("\n")
  }

  /// `truncate_structured` then `render`.
  pub fn render_truncated(&self, text: &str, max_chars: usize) -> String {
    self.render(&truncate_structured(text.trim(), max_chars))
  }
}

/// Cuts `text` to at most `max_chars` characters (plus `TRUNCATION_NOTICE`).
///
/// If the cut lands inside a code fence, room is made for a closing fence so the
/// budget still holds and the renderer never sees a half-open block.
pub fn truncate_structured(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    return text.to_string();
  }

  let mut cut = take_chars(text, max_chars);
  if leaves_fence_open(cut) {
    cut = take_chars(text, max_chars.saturating_sub(FENCE_CLOSE.chars().count()));
  }

  let mut out = cut.trim_end().to_string();
  if leaves_fence_open(&out) {
    out.push_str(FENCE_CLOSE);
  }
  out.push_str(TRUNCATION_NOTICE);
  out
}

fn take_chars(text: &str, n: usize) -> &str {
  match text.char_indices().nth(n) {
    Some((idx, _)) => &text[..idx],
    None => text,
  }
}

fn leaves_fence_open(text: &str) -> bool {
  let mut classifier = LineClassifier::default();
  for line in text.split('\n') {
    classifier.classify(line);
  }
  classifier.in_fence()
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL_RESERVED: &str = r"_*[]()~`>#+-=|{}.!\ end";

  fn assert_markdown_v2_escaped(segment: &str) {
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
      if c == '\\' {
        let next = chars.next().expect("dangling backslash");
        assert!(
          next == '\\' || MARKDOWN_V2_RESERVED.contains(&next),
          "backslash before non-reserved {:?} in {:?}",
          next,
          segment
        );
      } else {
        assert!(!MARKDOWN_V2_RESERVED.contains(&c), "unescaped {:?} in {:?}", c, segment);
      }
    }
  }

  #[test]
  fn classification_follows_priority_order() {
    let mut c = LineClassifier::default();
    assert_eq!(c.classify("```rust"), LineKind::FenceOpen { lang: "rust" });
    assert_eq!(c.classify("# not a heading"), LineKind::InFence("# not a heading"));
    assert_eq!(c.classify("- nor a bullet"), LineKind::InFence("- nor a bullet"));
    assert_eq!(c.classify("  ```"), LineKind::FenceClose);
    assert_eq!(c.classify("   "), LineKind::Blank);
    assert_eq!(c.classify("### Sub"), LineKind::Heading { level: 3, label: "Sub" });
    assert_eq!(c.classify("####### seven"), LineKind::Plain("####### seven"));
    assert_eq!(c.classify("#nospace"), LineKind::Plain("#nospace"));
    assert_eq!(c.classify("* star item"), LineKind::Bullet("star item"));
    assert_eq!(c.classify("12) twelve"), LineKind::Numbered { number: "12", text: "twelve" });
    assert_eq!(c.classify("3.14 is pi"), LineKind::Plain("3.14 is pi"));
  }

  #[test]
  fn html_renders_structure_and_escapes() {
    let r = Renderer::new(MarkupKind::Html);
    let got = r.render("# Main\n## Sub\n- a < b\n1. first & last\nplain \"q\"\n```go\nif a < b {}\n```");
    assert!(got.contains("<b>Main</b>"));
    assert!(got.contains("<b>▸ Sub</b>"));
    assert!(got.contains("• a &lt; b"));
    assert!(got.contains("1. first &amp; last"));
    assert!(got.contains("plain &#34;q&#34;"));
    assert!(got.contains("<pre><code class=\"language-go\">if a &lt; b {}</code></pre>"));
  }

  #[test]
  fn markdown_v2_renders_structure() {
    let r = Renderer::new(MarkupKind::MarkdownV2);
    let got = r.render("# Main\n## Sub\n- item\n1. first\n```go\nfmt.Println(`ok`)\n```");
    for want in ["*Main*", "*▸ Sub*", "• item", "1\\. first", "```go", "fmt.Println(\\`ok\\`)"] {
      assert!(got.contains(want), "missing {:?} in {}", want, got);
    }
  }

  #[test]
  fn markdown_v2_code_keeps_reserved_chars_verbatim() {
    let r = Renderer::new(MarkupKind::MarkdownV2);
    let got = r.render("```\nx = a.b(c) - [d] \\ e\n```");
    assert_eq!(got, "```\nx = a.b(c) - [d] \\\\ e\n```");
  }

  #[test]
  fn markdown_v2_leaves_nothing_unescaped_outside_code() {
    let r = Renderer::new(MarkupKind::MarkdownV2);
    let input = format!(
      "{all}\n- {all}\n7. {all}\n# T {all}\n```\n{all}\n```",
      all = ALL_RESERVED
    );
    let got = r.render(&input);
    let lines: Vec<&str> = got.lines().collect();
    assert_markdown_v2_escaped(lines[0]);
    assert_markdown_v2_escaped(lines[1].trim_start_matches("• "));
    assert_markdown_v2_escaped(lines[2].trim_start_matches("7\\. "));
    let heading = lines[3];
    assert!(heading.starts_with('*') && heading.ends_with('*'));
    assert_markdown_v2_escaped(&heading[1..heading.len() - 1]);
    assert_eq!(lines[4], "```");
  }

  #[test]
  fn html_leaves_nothing_unescaped_outside_tags() {
    let r = Renderer::new(MarkupKind::Html);
    let got = r.render("a < b > c & d \"e\" 'f'\n- <script>");
    assert_eq!(got, "a &lt; b &gt; c &amp; d &#34;e&#34; &#39;f&#39;\n• &lt;script&gt;");
  }

  #[test]
  fn unterminated_fence_is_closed() {
    let html = Renderer::new(MarkupKind::Html).render("text\n```py\nprint(1)");
    assert!(html.ends_with("<pre><code class=\"language-py\">print(1)</code></pre>"));
    let md = Renderer::new(MarkupKind::MarkdownV2).render("text\n```py\nprint(1)");
    assert!(md.ends_with("```py\nprint(1)\n```"));
    assert_eq!(md.matches("```").count(), 2);
  }

  #[test]
  fn crlf_and_surrounding_whitespace_are_normalized() {
    let r = Renderer::new(MarkupKind::Html);
    assert_eq!(r.render("\r\n  - a\r\n- b\r\n\r\n"), "• a\n• b");
    assert_eq!(r.render("   "), "");
  }

  #[test]
  fn code_language_is_sanitized() {
    assert_eq!(sanitize_code_language(" c++ "), "c");
    assert_eq!(sanitize_code_language("python3<script>"), "python3script");
    assert_eq!(sanitize_code_language("--"), "");
  }

  #[test]
  fn truncation_respects_budget() {
    let long = "word ".repeat(400);
    for max in [0usize, 1, 10, 99, 650, 1500] {
      let cut = truncate_structured(&long, max);
      assert!(cut.chars().count() <= max + TRUNCATION_NOTICE.chars().count(), "max={}", max);
      assert!(cut.ends_with(TRUNCATION_NOTICE));
    }
    assert_eq!(truncate_structured("short", 10), "short");
  }

  #[test]
  fn truncation_closes_open_fence_within_budget() {
    let text = format!("intro\n```rust\n{}\n```\nafter", "let x = 1;\n".repeat(100));
    for max in [8usize, 12, 20, 40, 300] {
      let cut = truncate_structured(&text, max);
      assert!(cut.chars().count() <= max + TRUNCATION_NOTICE.chars().count(), "max={}", max);
      assert!(!leaves_fence_open(cut.trim_end_matches(TRUNCATION_NOTICE)), "open fence at max={}", max);
    }
    let rendered = Renderer::new(MarkupKind::MarkdownV2).render_truncated(&text, 60);
    assert_eq!(rendered.matches("```").count(), 2);
    assert!(rendered.ends_with("\\[truncated\\]"));
  }
}
