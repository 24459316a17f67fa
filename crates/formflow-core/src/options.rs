use serde_json::Value;

use crate::spec::component::{ChoiceOption, ChoiceProps};
use crate::spec::form::{DataSource, FormDefinition};

/// Where the options of a choice component come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedOptions<'a> {
    Inline(&'a [ChoiceOption]),
    Static(&'a [ChoiceOption]),
    /// Must be fetched by the host; the core performs no network I/O.
    Remote { source: &'a str, url: &'a str },
    Unknown { source: &'a str },
}

impl<'a> ResolvedOptions<'a> {
    /// Options available without a fetch.
    pub fn options(&self) -> &'a [ChoiceOption] {
        match *self {
            ResolvedOptions::Inline(options) | ResolvedOptions::Static(options) => options,
            ResolvedOptions::Remote { .. } | ResolvedOptions::Unknown { .. } => &[],
        }
    }

    pub fn needs_fetch(&self) -> bool {
        matches!(self, ResolvedOptions::Remote { .. })
    }
}

/// Inline options win over `props.dataSource`.
pub fn options_for<'a>(definition: &'a FormDefinition, choices: &'a ChoiceProps) -> ResolvedOptions<'a> {
    if !choices.options.is_empty() {
        return ResolvedOptions::Inline(&choices.options);
    }
    let Some(source) = choices.data_source.as_deref() else {
        return ResolvedOptions::Inline(&choices.options);
    };
    match definition.data_sources.get(source) {
        Some(DataSource::Static { options }) => ResolvedOptions::Static(options),
        Some(DataSource::Remote { url }) => ResolvedOptions::Remote { source, url },
        None => ResolvedOptions::Unknown { source },
    }
}

/// Display label for a stored choice value; unknown values are returned as is.
pub fn option_label(options: &[ChoiceOption], value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(text) => text.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    options
        .iter()
        .find(|option| option.value == raw)
        .map(|option| option.label.clone())
}

/// Replaces stored choice values with their labels, element-wise for lists.
pub fn labelled_value(options: &[ChoiceOption], value: &Value) -> Value {
    if options.is_empty() {
        return value.clone();
    }
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| labelled_value(options, item))
                .collect(),
        ),
        other => option_label(options, other)
            .map(Value::String)
            .unwrap_or_else(|| other.clone()),
    }
}
