//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

/// Accepts a bare slug or a LeetCode problem URL and returns the lowercase slug.
/// Returns an empty string when nothing usable is left.
pub fn normalize_slug(raw: &str) -> String {
  let lower = raw.trim().to_lowercase();
  let mut v = lower.trim_matches('/');
  if v.is_empty() {
    return String::new();
  }
  const MARKER: &str = "leetcode.com/problems/";
  if let Some(idx) = v.find(MARKER) {
    v = &v[idx + MARKER.len()..];
  }
  if let Some(idx) = v.find(|c| c == '/' || c == '?' || c == '#') {
    v = &v[..idx];
  }
  v.trim_matches('/').to_string()
}

/// Telegram usernames compare case-insensitively and without the leading `@`.
pub fn normalize_username(raw: &str) -> String {
  let lower = raw.trim().to_lowercase();
  lower.strip_prefix('@').unwrap_or(&lower).to_string()
}

/// Short label for the zones users see most; other zones print their IANA name.
pub fn tz_label(tz: &str) -> &str {
  match tz {
    "Asia/Singapore" => "SGT",
    "UTC" | "Etc/UTC" => "UTC",
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_every_placeholder() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn slug_from_url_or_plain_text() {
    assert_eq!(normalize_slug("Two-Sum"), "two-sum");
    assert_eq!(normalize_slug("https://leetcode.com/problems/two-sum/description/"), "two-sum");
    assert_eq!(normalize_slug("leetcode.com/problems/lru-cache?envType=daily"), "lru-cache");
    assert_eq!(normalize_slug("  /  "), "");
  }

  #[test]
  fn usernames_are_normalized() {
    assert_eq!(normalize_username(" @Alice "), "alice");
    assert_eq!(normalize_username("bob"), "bob");
  }

  #[test]
  fn log_truncation_respects_char_boundaries() {
    let out = trunc_for_log("héllo wörld", 4);
    assert!(out.starts_with("héll…"));
  }
}
