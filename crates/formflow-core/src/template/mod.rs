use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

use crate::values::{FormValues, is_empty_value};

/// Text substituted for a placeholder that resolves to nothing.
pub const MISSING: &str = "-";

/// Modes describing how unresolved placeholders are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Fuzzy key matching, then `-` for anything still missing.
    #[default]
    Lenient,
    /// Exact path or key only; a missing value is an error.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template variable '{0}' has no value")]
    Missing(String),
}

static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();

fn placeholder_pattern() -> Option<&'static Regex> {
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").ok())
        .as_ref()
}

/// Substitutes `{{name}}` placeholders with formatted field values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateVariableResolver {
    mode: ResolutionMode,
}

impl TemplateVariableResolver {
    pub fn new(mode: ResolutionMode) -> Self {
        Self { mode }
    }

    pub fn strict() -> Self {
        Self::new(ResolutionMode::Strict)
    }

    /// Lookup order per placeholder: dotted path, literal key, case and
    /// separator insensitive key, first key containing the name. Each step is
    /// skipped when it finds nothing or an empty value.
    pub fn resolve(&self, text: &str, values: &FormValues) -> String {
        let Some(pattern) = placeholder_pattern() else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |captures: &Captures<'_>| {
                let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                match find_value(name, values, ResolutionMode::Lenient) {
                    Some(value) => format_value(value),
                    None => MISSING.to_string(),
                }
            })
            .into_owned()
    }

    /// Resolves according to the configured mode; lenient mode never fails.
    pub fn try_resolve(&self, text: &str, values: &FormValues) -> Result<String, TemplateError> {
        if self.mode == ResolutionMode::Lenient {
            return Ok(self.resolve(text, values));
        }
        let Some(pattern) = placeholder_pattern() else {
            return Ok(text.to_string());
        };
        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for captures in pattern.captures_iter(text) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let value = find_value(name.as_str(), values, ResolutionMode::Strict)
                .ok_or_else(|| TemplateError::Missing(name.as_str().to_string()))?;
            output.push_str(&text[last..whole.start()]);
            output.push_str(&format_value(value));
            last = whole.end();
        }
        output.push_str(&text[last..]);
        Ok(output)
    }
}

/// Free-function form of the lenient resolver.
pub fn resolve(text: &str, values: &FormValues) -> String {
    TemplateVariableResolver::default().resolve(text, values)
}

/// Placeholder names referenced by `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    let Some(pattern) = placeholder_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn find_value<'v>(name: &str, values: &'v FormValues, mode: ResolutionMode) -> Option<&'v Value> {
    let present = |value: &&Value| !is_empty_value(Some(*value));
    if name.is_empty() {
        return None;
    }
    if let Some(value) = values.lookup_path(name).filter(present) {
        return Some(value);
    }
    if let Some(value) = values.get(name).filter(present) {
        return Some(value);
    }
    if mode == ResolutionMode::Strict {
        return None;
    }

    let wanted = normalize(name);
    if wanted.is_empty() {
        return None;
    }
    let map = values.as_map();
    if let Some(value) = map
        .iter()
        .find(|(key, value)| normalize(key) == wanted && present(value))
        .map(|(_, value)| value)
    {
        return Some(value);
    }
    map.iter()
        .find(|(key, value)| normalize(key).contains(&wanted) && present(value))
        .map(|(_, value)| value)
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Readable rendering of a field value: `Yes`/`No` for booleans, numbers as
/// written, lists comma-joined, records as `Item N: ...` joined with `; `.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => MISSING.to_string(),
        Value::Bool(flag) => (if *flag { "Yes" } else { "No" }).to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => {
            if text.trim().is_empty() {
                MISSING.to_string()
            } else {
                text.clone()
            }
        }
        Value::Array(items) => {
            if items.iter().any(Value::is_object) {
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| format!("Item {}: {}", index + 1, join_present(item)))
                    .collect::<Vec<_>>()
                    .join("; ")
            } else {
                items
                    .iter()
                    .filter(|item| !is_empty_value(Some(*item)))
                    .map(format_value)
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
        Value::Object(_) => join_present(value),
    }
}

fn join_present(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .values()
            .filter(|item| !is_empty_value(Some(*item)))
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => format_value(other),
    }
}
