//! Common utilities for document generation.
//!
//! Shared helpers for escaping, metadata extraction, and text cleanup.

use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Escape special characters for HTML text and attribute values.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Return the first non-blank string value found under any of `names`.
///
/// Aliases are tried in order; non-string values are skipped.
pub fn extract_string_field(data: Option<&Value>, names: &[&str]) -> Option<String> {
    let object = data?.as_object()?;
    names.iter().find_map(|name| {
        object
            .get(*name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Remove HTML tags and unescape the common entities.
pub fn strip_html_tags(content: &str) -> String {
    unescape_entities(&HTML_TAG.replace_all(content, ""))
}

pub fn unescape_entities(content: &str) -> String {
    content
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

/// Collapse whitespace runs into single spaces and trim the ends.
pub fn normalize_whitespace(content: &str) -> String {
    WHITESPACE.replace_all(content, " ").trim().to_string()
}

/// Plain text for an SMS body: strip tags, unescape entities, collapse whitespace.
///
/// Runs once. Entities decoded here stay as literal characters, so escaped
/// user data such as `2 &lt; 3` comes back as `2 < 3`.
pub fn clean_text(content: &str) -> String {
    normalize_whitespace(&strip_html_tags(content))
}

/// Local timestamp used in generated metadata headers.
pub fn generated_at() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}
