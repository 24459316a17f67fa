use serde::Serialize;
use serde_json::Value;

use crate::computed::ExpressionOverrides;
use crate::i18n::TranslationService;
use crate::options::{labelled_value, options_for};
use crate::page_order::compute_logical_order;
use crate::spec::component::{Component, ComponentKind};
use crate::spec::form::FormDefinition;
use crate::template::{MISSING, format_value};
use crate::values::FormValues;
use crate::visibility::{VisibilityMap, resolve_visibility};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub field_id: String,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySection {
    pub page_id: String,
    pub title: String,
    pub entries: Vec<SummaryEntry>,
}

/// Visible input fields of every page, in logical page order, with their
/// translated label and a formatted value. Choice values show their option
/// labels. Pages without visible fields are left out.
pub fn confirmation_summary(
    definition: &FormDefinition,
    values: &FormValues,
    translations: &TranslationService,
    overrides: Option<&ExpressionOverrides>,
) -> Vec<SummarySection> {
    let order = compute_logical_order(&definition.pages);
    let mut sections = Vec::new();
    for entry in order.entries() {
        let Some(page) = definition.pages.get(entry.raw_index.0) else {
            continue;
        };
        let visibility = resolve_visibility(&page.components, values, overrides);
        let mut entries = Vec::new();
        collect(definition, &page.components, values, translations, overrides, &visibility, &mut entries);
        if entries.is_empty() {
            continue;
        }
        sections.push(SummarySection {
            page_id: page.id.clone(),
            title: translations.page_title(&page.id, &page.title),
            entries,
        });
    }
    sections
}

fn collect(
    definition: &FormDefinition,
    components: &[Component],
    values: &FormValues,
    translations: &TranslationService,
    overrides: Option<&ExpressionOverrides>,
    visibility: &VisibilityMap,
    entries: &mut Vec<SummaryEntry>,
) {
    for component in components {
        if !visibility.get(&component.id).copied().unwrap_or(true) {
            continue;
        }
        match &component.kind {
            ComponentKind::Section(container) | ComponentKind::Form(container) => {
                collect(definition, &container.children, values, translations, overrides, visibility, entries);
            }
            kind if kind.is_field() => {
                let declared = overrides
                    .and_then(|overrides| overrides.label(&component.id))
                    .unwrap_or(&component.label);
                let raw = values.lookup(&component.id).cloned().unwrap_or(Value::Null);
                let shown = match kind.choices() {
                    Some(choices) => labelled_value(options_for(definition, choices).options(), &raw),
                    None => raw,
                };
                let mut value = format_value(&shown);
                if value.trim().is_empty() {
                    value = MISSING.to_string();
                }
                entries.push(SummaryEntry {
                    field_id: component.id.clone(),
                    label: translations.component_label(&component.id, declared),
                    value,
                });
            }
            _ => {}
        }
    }
}
