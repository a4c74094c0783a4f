//! Telegram HTML (`parse_mode=HTML`).

use super::Dialect;

pub struct Html;

/// Escapes `& < > " '`. Quotes use numeric references so attribute values stay safe.
pub fn escape_html(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&#34;"),
      '\'' => out.push_str("&#39;"),
      other => out.push(other),
    }
  }
  out
}

impl Dialect for Html {
  fn parse_mode(&self) -> &'static str {
    "HTML"
  }

  fn escape(&self, text: &str) -> String {
    escape_html(text)
  }

  fn bold(&self, text: &str) -> String {
    format!("<b>{}</b>", escape_html(text))
  }

  fn italic(&self, text: &str) -> String {
    format!("<i>{}</i>", escape_html(text))
  }

  fn inline_code(&self, text: &str) -> String {
    format!("<code>{}</code>", escape_html(text))
  }

  fn link(&self, label: &str, url: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_html(url), escape_html(label))
  }

  fn numbered(&self, number: &str, text: &str) -> String {
    format!("{}. {}", number, escape_html(text))
  }

  fn code_block(&self, lang: &str, lines: &[&str]) -> String {
    let code = escape_html(&lines.join("\n"));
    if lang.is_empty() {
      format!("<pre>{}</pre>", code)
    } else {
      format!("<pre><code class=\"language-{}\">{}</code></pre>", lang, code)
    }
  }
}
