//! Translation dictionary lookup.
//!
//! Keys are flat dotted strings: `ui.next`, `validation.required`,
//! `components.<id>.label`, `components.<id>.<prop>` and `pages.<id>.title`.
//! Dictionaries may be written nested; [`flatten_dictionary`] joins the
//! levels with `.`.

use std::collections::BTreeMap;

use serde_json::Value;

/// Key -> text for one language.
pub type Dictionary = BTreeMap<String, String>;

/// Language -> dictionary.
pub type Translations = BTreeMap<String, Dictionary>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationService {
    translations: Translations,
    language: Option<String>,
}

impl TranslationService {
    pub fn new(translations: Translations, language: Option<String>) -> Self {
        Self {
            translations,
            language: language.map(|language| normalize_tag(&language)),
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language(&mut self, language: Option<&str>) {
        self.language = language.map(normalize_tag);
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.translations.keys().map(String::as_str)
    }

    /// Override text for `key` in the selected language. `nl-BE` falls back
    /// to `nl`; no language selected means no overrides.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        let language = self.language.as_deref()?;
        self.dictionary(language)
            .and_then(|dictionary| dictionary.get(key))
            .or_else(|| {
                let base = base_language(language)?;
                self.dictionary(base)?.get(key)
            })
            .map(String::as_str)
    }

    pub fn translate(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or(default).to_string()
    }

    /// Like [`translate`](Self::translate), then substitutes `{name}` placeholders.
    pub fn translate_with(&self, key: &str, default: &str, args: &[(&str, String)]) -> String {
        interpolate(self.lookup(key).unwrap_or(default), args)
    }

    pub fn component_label(&self, component_id: &str, default: &str) -> String {
        self.component_prop(component_id, "label", default)
    }

    pub fn component_prop(&self, component_id: &str, prop: &str, default: &str) -> String {
        self.translate(&format!("components.{component_id}.{prop}"), default)
    }

    pub fn page_title(&self, page_id: &str, default: &str) -> String {
        self.translate(&format!("pages.{page_id}.title"), default)
    }

    fn dictionary(&self, language: &str) -> Option<&Dictionary> {
        self.translations.get(language).or_else(|| {
            self.translations
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(language))
                .map(|(_, dictionary)| dictionary)
        })
    }
}

/// Replaces every `{name}` token with its argument. Unknown tokens stay as
/// written.
pub fn interpolate(template: &str, args: &[(&str, String)]) -> String {
    let mut output = template.to_string();
    for (name, value) in args {
        let token = format!("{{{name}}}");
        output = output.replace(&token, value);
    }
    output
}

/// Flattens a nested JSON dictionary into dotted keys. Non-string leaves are
/// rendered as JSON text.
pub fn flatten_dictionary(value: &Value) -> Dictionary {
    let mut dictionary = Dictionary::new();
    flatten_into(value, String::new(), &mut dictionary);
    dictionary
}

fn flatten_into(value: &Value, prefix: String, dictionary: &mut Dictionary) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, path, dictionary);
            }
        }
        Value::String(text) => {
            dictionary.insert(prefix, text.clone());
        }
        Value::Null => {}
        other => {
            dictionary.insert(prefix, other.to_string());
        }
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-")
}

fn base_language(tag: &str) -> Option<&str> {
    tag.split_once('-').map(|(base, _)| base)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn service(language: &str) -> TranslationService {
        let mut translations = Translations::new();
        translations.insert(
            "nl".into(),
            flatten_dictionary(&json!({
                "ui": { "next": "Volgende" },
                "validation": { "required": "{fieldLabel} is verplicht" },
                "components": { "name": { "label": "Naam" } }
            })),
        );
        TranslationService::new(translations, Some(language.into()))
    }

    #[test]
    fn falls_back_to_base_language() {
        let service = service("nl_BE");
        assert_eq!(service.translate("ui.next", "Next"), "Volgende");
        assert_eq!(service.translate("ui.previous", "Previous"), "Previous");
    }

    #[test]
    fn substitutes_placeholders() {
        let service = service("nl");
        let label = service.component_label("name", "Name");
        assert_eq!(
            service.translate_with("validation.required", "{fieldLabel} is required", &[("fieldLabel", label)]),
            "Naam is verplicht"
        );
    }

    #[test]
    fn no_language_means_defaults() {
        let mut service = service("nl");
        service.set_language(None);
        assert_eq!(service.translate("ui.next", "Next"), "Next");
    }
}
