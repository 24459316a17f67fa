use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::i18n::{Dictionary, TranslationService, Translations, flatten_dictionary};

/// Host configuration for a rendering session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormSettings {
    /// Expose the submission log to the host.
    pub show_form_submissions: bool,
    /// Read-only mode: navigation actions are ignored.
    pub disabled: bool,
    /// Namespace for generated field ids.
    pub prefix_id: Option<String>,
    pub current_language: Option<String>,
    #[serde(deserialize_with = "nested_translations")]
    pub translations: Translations,
    /// Overrides for built-in UI strings (`ui.<key>` or `<key>`) and default
    /// error messages (`validation.<rule>`).
    #[serde(deserialize_with = "nested_dictionary")]
    pub custom_texts: Dictionary,
    /// Opaque presentation hook; carried through untouched.
    pub style_overrides: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML settings: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported settings format '{0}' (expected .json or .toml)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Json,
    Toml,
}

impl SettingsFormat {
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(SettingsFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(SettingsFormat::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

impl FormSettings {
    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn parse(raw: &str, format: SettingsFormat) -> Result<Self, SettingsError> {
        match format {
            SettingsFormat::Json => Self::from_json_str(raw),
            SettingsFormat::Toml => Self::from_toml_str(raw),
        }
    }

    pub fn translation_service(&self) -> TranslationService {
        TranslationService::new(self.translations.clone(), self.current_language.clone())
    }

    /// Field id as exposed to the host, namespaced by `prefixId`.
    pub fn field_dom_id(&self, field_path: &str) -> String {
        let sanitized: String = field_path
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '-' })
            .collect();
        match self.prefix_id.as_deref().filter(|prefix| !prefix.is_empty()) {
            Some(prefix) => format!("{prefix}-{sanitized}"),
            None => sanitized,
        }
    }
}

fn nested_translations<'de, D>(deserializer: D) -> Result<Translations, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(language, dictionary)| (language, flatten_dictionary(&dictionary)))
        .collect())
}

fn nested_dictionary<'de, D>(deserializer: D) -> Result<Dictionary, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(flatten_dictionary(&raw))
}
