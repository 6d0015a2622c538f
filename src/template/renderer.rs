//! Template rendering.
//!
//! The pipeline treats rendering as an opaque `render(source, data) -> text`
//! capability. [`PlaceholderRenderer`] is the built-in implementation: it
//! substitutes `{{ dot.path }}` expressions with values looked up in the data
//! map, HTML-escaped.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::generators::common::escape_html;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unclosed expression starting at byte {0}")]
    UnclosedExpression(usize),
    #[error("empty expression at byte {0}")]
    EmptyExpression(usize),
}

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, source: &str, data: &Map<String, Value>) -> Result<String, RenderError>;
}

/// Substitutes `{{ path }}` expressions. Missing or null values render empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, source: &str, data: &Map<String, Value>) -> Result<String, RenderError> {
        let mut output = String::with_capacity(source.len());
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);

            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or(RenderError::UnclosedExpression(offset + start))?;

            let path = after_open[..end].trim();
            if path.is_empty() {
                return Err(RenderError::EmptyExpression(offset + start));
            }

            if let Some(value) = lookup(data, path) {
                output.push_str(&escape_html(&value_to_text(value)));
            }

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        output.push_str(rest);
        Ok(output)
    }
}

fn lookup<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
