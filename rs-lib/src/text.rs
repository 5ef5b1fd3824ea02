// Copyright 2023-2026 the Scratchpack authors. All rights reserved. MIT license.

use std::ops::Range;

const BOM_CHAR: char = '\u{FEFF}';

/// Strips the byte order mark from the provided text if it exists.
pub fn strip_bom(text: &str) -> &str {
  if text.starts_with(BOM_CHAR) {
    &text[BOM_CHAR.len_utf8()..]
  } else {
    text
  }
}

/// Whether a fetched body resembles executable script rather than a markup
/// document. Some CDN hosts answer missing paths with an HTML error page and
/// a 200 status, so a status check alone is not enough.
pub fn looks_like_script(body: &str) -> bool {
  let trimmed = strip_bom(body).trim_start();
  if trimmed.is_empty() {
    return false;
  }
  let head = trimmed.get(..64).unwrap_or(trimmed).to_lowercase();
  !(head.starts_with("<!doctype")
    || head.starts_with("<html")
    || head.starts_with("<head")
    || head.starts_with("<body")
    || head.starts_with("<?xml"))
}

/// A replacement of a byte range within a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
  pub range: Range<usize>,
  pub new_text: String,
}

/// Applies the provided changes to the source text. Overlapping ranges are
/// resolved in favor of the earliest change.
pub fn apply_text_changes(source: &str, mut changes: Vec<TextChange>) -> String {
  changes.sort_by_key(|change| change.range.start);
  let mut result = String::with_capacity(source.len());
  let mut last_end = 0;
  for change in changes {
    if change.range.start < last_end {
      continue;
    }
    result.push_str(&source[last_end..change.range.start]);
    result.push_str(&change.new_text);
    last_end = change.range.end;
  }
  result.push_str(&source[last_end..]);
  result
}

pub fn capitalize_first(text: &str) -> String {
  let mut chars = text.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// `react-dom` -> `reactDom`
pub fn camel_case_from_hyphens(text: &str) -> String {
  let mut result = String::with_capacity(text.len());
  let mut upper_next = false;
  for c in text.chars() {
    if c == '-' {
      upper_next = true;
    } else if upper_next {
      result.extend(c.to_uppercase());
      upper_next = false;
    } else {
      result.push(c);
    }
  }
  result
}

/// `react-dom` -> `ReactDom`
pub fn pascal_case_from_hyphens(text: &str) -> String {
  capitalize_first(&camel_case_from_hyphens(text))
}

/// Drops every character that cannot appear in a JavaScript identifier.
pub fn strip_punctuation(text: &str) -> String {
  text
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
    .collect()
}

/// Renders text as a double-quoted JavaScript string literal.
pub fn js_string(text: &str) -> String {
  serde_json::Value::String(text.to_string()).to_string()
}
