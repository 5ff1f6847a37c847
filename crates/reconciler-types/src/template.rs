//! Go-style `{{.name}}` text templating.
//!
//! Rendering is a single substitution pass over a resolved `name -> value` map,
//! followed by a JSON-escaping pass for substitutions landing inside a JSON string
//! literal (`spec.md` §4.D). Errors here are fatal for the owning config only.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named text with `{{.name}}` placeholders, rendered against the parameter map
/// produced by [`crate::parameter`] resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub body: String,
}

impl Template {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    pub placeholder: String,
    pub reason: String,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "placeholder {{{{.{}}}}}: {}", self.placeholder, self.reason)
    }
}

impl std::error::Error for TemplateError {}

/// Render `body`'s `{{.name}}` placeholders against `values`. A placeholder whose
/// name is absent from `values` is a fatal [`TemplateError`] — partial rendering is
/// never returned.
pub fn render(body: &str, values: &BTreeMap<String, Value>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(body.len());
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' && body[i..].starts_with("{{.") {
            let rest = &body[i + 3..];
            if let Some(end) = rest.find("}}") {
                let name = &rest[..end];
                let value = values.get(name).ok_or_else(|| TemplateError {
                    placeholder: name.to_string(),
                    reason: "no such parameter".to_string(),
                })?;
                out.push_str(&render_scalar_for_substitution(value));
                i += 3 + end + 2;
                continue;
            }
        }
        let ch = body[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    Ok(out)
}

/// Render a resolved value for substitution into a JSON payload body. Strings are
/// JSON-escaped (quotes, backslashes, control characters) since they are almost
/// always substituted inside a JSON string literal; structured values (objects,
/// arrays, numbers, bools) are rendered as their own JSON form so substituting
/// a compound/list parameter into a templated payload doesn't double-quote it.
fn render_scalar_for_substitution(value: &Value) -> String {
    match value {
        Value::String(s) => escape_json_string_body(s),
        other => other.to_string(),
    }
}

fn escape_json_string_body(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
