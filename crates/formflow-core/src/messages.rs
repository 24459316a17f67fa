use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::i18n::{TranslationService, interpolate};
use crate::spec::component::Component;

/// Rule that produced a validation error. The camelCase name doubles as the
/// key in `validation.errorMessages` and, prefixed with `validation.`, in
/// translation dictionaries and custom texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Required,
    MinLength,
    MaxLength,
    Pattern,
    Email,
    Number,
    Min,
    Max,
    InvalidDate,
    MinDate,
    MaxDate,
    MinItems,
    MaxItems,
    MinRange,
    MaxRange,
    MinValueMin,
    MinValueMax,
    MaxValueMin,
    MaxValueMax,
    Expression,
}

impl ErrorKind {
    pub fn key(self) -> &'static str {
        match self {
            ErrorKind::Required => "required",
            ErrorKind::MinLength => "minLength",
            ErrorKind::MaxLength => "maxLength",
            ErrorKind::Pattern => "pattern",
            ErrorKind::Email => "email",
            ErrorKind::Number => "number",
            ErrorKind::Min => "min",
            ErrorKind::Max => "max",
            ErrorKind::InvalidDate => "invalidDate",
            ErrorKind::MinDate => "minDate",
            ErrorKind::MaxDate => "maxDate",
            ErrorKind::MinItems => "minItems",
            ErrorKind::MaxItems => "maxItems",
            ErrorKind::MinRange => "minRange",
            ErrorKind::MaxRange => "maxRange",
            ErrorKind::MinValueMin => "minValueMin",
            ErrorKind::MinValueMax => "minValueMax",
            ErrorKind::MaxValueMin => "maxValueMin",
            ErrorKind::MaxValueMax => "maxValueMax",
            ErrorKind::Expression => "expression",
        }
    }

    pub fn translation_key(self) -> String {
        format!("validation.{}", self.key())
    }

    /// Built-in English message. `{fieldLabel}` plus a placeholder named after
    /// the rule are substituted.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::Required => "{fieldLabel} is required",
            ErrorKind::MinLength => "{fieldLabel} must be at least {minLength} characters",
            ErrorKind::MaxLength => "{fieldLabel} must be at most {maxLength} characters",
            ErrorKind::Pattern => "{fieldLabel} has an invalid format",
            ErrorKind::Email => "{fieldLabel} must be a valid email address",
            ErrorKind::Number => "{fieldLabel} must be a number",
            ErrorKind::Min => "{fieldLabel} must be at least {min}",
            ErrorKind::Max => "{fieldLabel} must be at most {max}",
            ErrorKind::InvalidDate => "{fieldLabel} must be a valid date",
            ErrorKind::MinDate => "{fieldLabel} must be on or after {minDate}",
            ErrorKind::MaxDate => "{fieldLabel} must be on or before {maxDate}",
            ErrorKind::MinItems => "{fieldLabel} requires at least {minItems} items",
            ErrorKind::MaxItems => "{fieldLabel} allows at most {maxItems} items",
            ErrorKind::MinRange => "{fieldLabel} range must span at least {minRange}",
            ErrorKind::MaxRange => "{fieldLabel} range must span at most {maxRange}",
            ErrorKind::MinValueMin => "{fieldLabel} minimum must be at least {minValueMin}",
            ErrorKind::MinValueMax => "{fieldLabel} minimum must be at most {minValueMax}",
            ErrorKind::MaxValueMin => "{fieldLabel} maximum must be at least {maxValueMin}",
            ErrorKind::MaxValueMax => "{fieldLabel} maximum must be at most {maxValueMax}",
            ErrorKind::Expression => "{fieldLabel} is invalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Built-in UI strings, overridable through translations (`ui.<key>`) and
/// custom texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiText {
    Next,
    Previous,
    Submit,
    Reset,
    Restart,
    GoBack,
    ThankYouTitle,
    ThankYouMessage,
    NoPages,
    InvalidForm,
    PageProgress,
    AddItem,
    RemoveItem,
    Submissions,
    ExpressionError,
}

impl UiText {
    pub fn key(self) -> &'static str {
        match self {
            UiText::Next => "next",
            UiText::Previous => "previous",
            UiText::Submit => "submit",
            UiText::Reset => "reset",
            UiText::Restart => "restart",
            UiText::GoBack => "goBack",
            UiText::ThankYouTitle => "thankYouTitle",
            UiText::ThankYouMessage => "thankYouMessage",
            UiText::NoPages => "noPages",
            UiText::InvalidForm => "invalidForm",
            UiText::PageProgress => "pageProgress",
            UiText::AddItem => "addItem",
            UiText::RemoveItem => "removeItem",
            UiText::Submissions => "submissions",
            UiText::ExpressionError => "expressionError",
        }
    }

    pub fn translation_key(self) -> String {
        format!("ui.{}", self.key())
    }

    pub fn default_text(self) -> &'static str {
        match self {
            UiText::Next => "Next",
            UiText::Previous => "Previous",
            UiText::Submit => "Submit",
            UiText::Reset => "Reset",
            UiText::Restart => "Start again",
            UiText::GoBack => "Go back",
            UiText::ThankYouTitle => "Thank you!",
            UiText::ThankYouMessage => "Your submission has been received.",
            UiText::NoPages => "No pages defined",
            UiText::InvalidForm => "Invalid form data",
            UiText::PageProgress => "Page {current} of {total}",
            UiText::AddItem => "Add item",
            UiText::RemoveItem => "Remove",
            UiText::Submissions => "Form submissions",
            UiText::ExpressionError => "This value could not be calculated",
        }
    }
}

/// Resolves user-facing text. Error messages are looked up in order:
/// translation for the selected language, the component's own
/// `errorMessages`, the custom text overrides, the built-in default.
#[derive(Debug, Clone, Copy)]
pub struct MessageResolver<'a> {
    translations: &'a TranslationService,
    custom_texts: &'a BTreeMap<String, String>,
}

impl<'a> MessageResolver<'a> {
    pub fn new(translations: &'a TranslationService, custom_texts: &'a BTreeMap<String, String>) -> Self {
        Self {
            translations,
            custom_texts,
        }
    }

    pub fn translations(&self) -> &'a TranslationService {
        self.translations
    }

    /// Translated label of a component; `label_override` replaces the
    /// declared label before translation.
    pub fn field_label(&self, component: &Component, label_override: Option<&str>) -> String {
        let declared = label_override.unwrap_or(&component.label);
        self.translations.component_label(&component.id, declared)
    }

    pub fn error_message(
        &self,
        component: &Component,
        kind: ErrorKind,
        params: &[(&str, String)],
        label_override: Option<&str>,
    ) -> String {
        let mut args = Vec::with_capacity(params.len() + 1);
        args.push(("fieldLabel", self.field_label(component, label_override)));
        args.extend(params.iter().cloned());

        let key = kind.translation_key();
        let template = self
            .translations
            .lookup(&key)
            .or_else(|| {
                component
                    .validation
                    .error_messages
                    .get(kind.key())
                    .map(String::as_str)
            })
            .or_else(|| self.custom_texts.get(&key).map(String::as_str))
            .unwrap_or(kind.default_message());
        interpolate(template, &args)
    }

    pub fn ui_text(&self, text: UiText, args: &[(&str, String)]) -> String {
        let key = text.translation_key();
        let template = self
            .translations
            .lookup(&key)
            .or_else(|| self.custom_texts.get(&key).map(String::as_str))
            .or_else(|| self.custom_texts.get(text.key()).map(String::as_str))
            .unwrap_or(text.default_text());
        interpolate(template, args)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::i18n::{Translations, flatten_dictionary};

    fn component() -> Component {
        serde_json::from_value(json!({
            "id": "name",
            "type": "input",
            "label": "Name",
            "validation": {
                "required": true,
                "minLength": 3,
                "errorMessages": { "minLength": "{fieldLabel} needs {minLength}+ letters" }
            }
        }))
        .expect("component")
    }

    #[test]
    fn falls_through_to_default() {
        let translations = TranslationService::default();
        let custom = BTreeMap::new();
        let resolver = MessageResolver::new(&translations, &custom);
        assert_eq!(
            resolver.error_message(&component(), ErrorKind::Required, &[], None),
            "Name is required"
        );
    }

    #[test]
    fn component_message_beats_custom_text() {
        let translations = TranslationService::default();
        let custom = BTreeMap::from([(
            "validation.minLength".to_string(),
            "Too short".to_string(),
        )]);
        let resolver = MessageResolver::new(&translations, &custom);
        assert_eq!(
            resolver.error_message(&component(), ErrorKind::MinLength, &[("minLength", "3".into())], None),
            "Name needs 3+ letters"
        );
    }

    #[test]
    fn translation_beats_component_message() {
        let translations = TranslationService::new(
            Translations::from([(
                "de".to_string(),
                flatten_dictionary(&json!({
                    "validation": { "minLength": "{fieldLabel}: mindestens {minLength} Zeichen" },
                    "components": { "name": { "label": "Vorname" } }
                })),
            )]),
            Some("de".into()),
        );
        let custom = BTreeMap::new();
        let resolver = MessageResolver::new(&translations, &custom);
        assert_eq!(
            resolver.error_message(&component(), ErrorKind::MinLength, &[("minLength", "3".into())], None),
            "Vorname: mindestens 3 Zeichen"
        );
    }

    #[test]
    fn custom_text_overrides_ui_string() {
        let translations = TranslationService::default();
        let custom = BTreeMap::from([("next".to_string(), "Continue".to_string())]);
        let resolver = MessageResolver::new(&translations, &custom);
        assert_eq!(resolver.ui_text(UiText::Next, &[]), "Continue");
        assert_eq!(resolver.ui_text(UiText::Previous, &[]), "Previous");
    }
}
