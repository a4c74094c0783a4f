//! Telegram MarkdownV2 (`parse_mode=MarkdownV2`).
//!
//! Outside code every reserved character gets a backslash. Inside code and
//! pre blocks only `\` and `` ` `` are escaped.

use super::Dialect;

pub const MARKDOWN_V2_RESERVED: &[char] = &[
  '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub struct MarkdownV2;

pub fn escape_markdown_v2(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + text.len() / 4);
  for c in text.chars() {
    if c == '\\' || MARKDOWN_V2_RESERVED.contains(&c) {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

fn escape_code(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    if c == '\\' || c == '`' {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

fn escape_link_target(url: &str) -> String {
  let mut out = String::with_capacity(url.len());
  for c in url.chars() {
    if c == '\\' || c == ')' {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

impl Dialect for MarkdownV2 {
  fn parse_mode(&self) -> &'static str {
    "MarkdownV2"
  }

  fn escape(&self, text: &str) -> String {
    escape_markdown_v2(text)
  }

  fn bold(&self, text: &str) -> String {
    format!("*{}*", escape_markdown_v2(text))
  }

  fn italic(&self, text: &str) -> String {
    format!("_{}_", escape_markdown_v2(text))
  }

  fn inline_code(&self, text: &str) -> String {
    format!("`{}`", escape_code(text))
  }

  fn link(&self, label: &str, url: &str) -> String {
    format!("[{}]({})", escape_markdown_v2(label), escape_link_target(url))
  }

  fn numbered(&self, number: &str, text: &str) -> String {
    format!("{}\\. {}", number, escape_markdown_v2(text))
  }

  fn code_block(&self, lang: &str, lines: &[&str]) -> String {
    format!("```{}\n{}\n```", lang, escape_code(&lines.join("\n")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn escapes_backslash_and_reserved() {
    assert_eq!(escape_markdown_v2(r"a\b.c!"), r"a\\b\.c\!");
  }

  #[test]
  fn link_target_only_escapes_paren_and_backslash() {
    let got = MarkdownV2.link("Two Sum", "https://leetcode.com/problems/two-sum/");
    assert_eq!(got, "[Two Sum](https://leetcode.com/problems/two-sum/)");
    assert_eq!(MarkdownV2.link("x", "https://a.test/(b)"), "[x](https://a.test/(b\\))");
  }

  #[test]
  fn inline_code_keeps_dots() {
    assert_eq!(MarkdownV2.inline_code("a.b`c"), "`a.b\\`c`");
  }
}
