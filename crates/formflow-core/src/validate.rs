use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

use crate::computed::ExpressionOverrides;
use crate::expr::number_value;
use crate::messages::{ErrorKind, MessageResolver};
use crate::spec::component::{Component, ComponentKind, InputType, SliderRangeProps};
use crate::spec::form::Page;
use crate::values::{FormValues, is_empty_value};
use crate::visibility::{component_visible, to_number};

/// Field path -> ordered error messages.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn email_pattern() -> Option<&'static Regex> {
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

/// Rule-based validator over a component tree.
///
/// Hidden components are skipped together with their subtree. Array groups
/// check their item count and then validate every item against that item's
/// own record, reporting paths as `array[index].child`.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    messages: MessageResolver<'a>,
    overrides: Option<&'a ExpressionOverrides>,
}

impl<'a> Validator<'a> {
    pub fn new(messages: MessageResolver<'a>) -> Self {
        Self {
            messages,
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: &'a ExpressionOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn validate_page(&self, page: &Page, values: &FormValues) -> ValidationErrors {
        let errors = self.validate_components(&page.components, values);
        debug!(page = %page.id, fields = errors.len(), "validated page");
        errors
    }

    pub fn validate_components(&self, components: &[Component], values: &FormValues) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        self.walk(components, values, "", self.overrides, &mut errors);
        errors
    }

    fn walk(
        &self,
        components: &[Component],
        scope: &FormValues,
        prefix: &str,
        overrides: Option<&ExpressionOverrides>,
        errors: &mut ValidationErrors,
    ) {
        for component in components {
            if !component_visible(component, scope, overrides) {
                continue;
            }
            let path = format!("{prefix}{}", component.id);
            match &component.kind {
                ComponentKind::Section(container) | ComponentKind::Form(container) => {
                    self.walk(&container.children, scope, prefix, overrides, errors);
                }
                ComponentKind::Array(array) => {
                    let value = scope.lookup(&component.id);
                    let messages = self.array_messages(component, value, overrides);
                    if !messages.is_empty() {
                        errors.insert(path.clone(), messages);
                    }
                    let items = value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
                    for (index, item) in items.iter().enumerate() {
                        let item_scope = FormValues::from_value(item.clone());
                        let item_prefix = format!("{path}[{index}].");
                        self.walk(&array.items, &item_scope, &item_prefix, None, errors);
                    }
                }
                kind if kind.is_field() => {
                    let messages = self.field_messages(component, scope.lookup(&component.id), overrides);
                    if !messages.is_empty() {
                        errors.insert(path, messages);
                    }
                }
                _ => {}
            }
        }
    }

    /// Messages for a single value-holding component.
    pub fn validate_field(&self, component: &Component, value: Option<&Value>) -> Vec<String> {
        match &component.kind {
            ComponentKind::Array(_) => self.array_messages(component, value, self.overrides),
            _ => self.field_messages(component, value, self.overrides),
        }
    }

    fn array_messages(
        &self,
        component: &Component,
        value: Option<&Value>,
        overrides: Option<&ExpressionOverrides>,
    ) -> Vec<String> {
        let mut found = Vec::new();
        let count = value.and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        if count == 0 && is_required(component, overrides) {
            found.push((ErrorKind::Required, Vec::new()));
        } else {
            check_item_count(component, count, &mut found);
        }
        check_expression_validity(component, overrides, &mut found);
        self.render(component, overrides, found)
    }

    fn field_messages(
        &self,
        component: &Component,
        value: Option<&Value>,
        overrides: Option<&ExpressionOverrides>,
    ) -> Vec<String> {
        let mut found = Vec::new();
        match value {
            Some(value) if !is_empty_value(Some(value)) => {
                check_value(component, value, &mut found);
            }
            _ => {
                if is_required(component, overrides) {
                    found.push((ErrorKind::Required, Vec::new()));
                }
            }
        }
        check_expression_validity(component, overrides, &mut found);
        self.render(component, overrides, found)
    }

    fn render(
        &self,
        component: &Component,
        overrides: Option<&ExpressionOverrides>,
        found: Vec<(ErrorKind, Vec<(&'static str, String)>)>,
    ) -> Vec<String> {
        let label = overrides.and_then(|overrides| overrides.label(&component.id));
        found
            .into_iter()
            .map(|(kind, params)| self.messages.error_message(component, kind, &params, label))
            .collect()
    }
}

type Found = Vec<(ErrorKind, Vec<(&'static str, String)>)>;

fn is_required(component: &Component, overrides: Option<&ExpressionOverrides>) -> bool {
    overrides
        .and_then(|overrides| overrides.required(&component.id))
        .unwrap_or(component.validation.required)
}

fn check_expression_validity(component: &Component, overrides: Option<&ExpressionOverrides>, found: &mut Found) {
    if overrides.and_then(|overrides| overrides.valid(&component.id)) == Some(false) {
        found.push((ErrorKind::Expression, Vec::new()));
    }
}

/// Type-specific rules for a present, non-empty value.
fn check_value(component: &Component, value: &Value, found: &mut Found) {
    let rules = &component.validation;
    match &component.kind {
        ComponentKind::Input(props) => {
            let text = scalar_text(value);
            match props.input_type {
                InputType::Email => {
                    if email_pattern().is_some_and(|pattern| !pattern.is_match(text.trim())) {
                        found.push((ErrorKind::Email, Vec::new()));
                    }
                }
                InputType::Number => match to_number(value) {
                    None => found.push((ErrorKind::Number, Vec::new())),
                    Some(number) => {
                        check_bounds(number, rules.min.or(props.min), rules.max.or(props.max), found);
                    }
                },
                _ => {}
            }
            check_text(component, &text, found);
        }
        ComponentKind::Textarea(_) => check_text(component, &scalar_text(value), found),
        ComponentKind::Select(_) | ComponentKind::Radio(_) | ComponentKind::Checkbox(_) => {
            if let Some(items) = value.as_array() {
                check_item_count(component, items.len(), found);
            }
        }
        ComponentKind::Date(props) => {
            let Some(date) = parse_date(&scalar_text(value)) else {
                found.push((ErrorKind::InvalidDate, Vec::new()));
                return;
            };
            let min_date = rules.min_date.as_ref().or(props.min_date.as_ref());
            if let Some(raw) = min_date
                && let Some(bound) = parse_date(raw)
                && date < bound
            {
                found.push((ErrorKind::MinDate, vec![("minDate", raw.clone())]));
            }
            let max_date = rules.max_date.as_ref().or(props.max_date.as_ref());
            if let Some(raw) = max_date
                && let Some(bound) = parse_date(raw)
                && date > bound
            {
                found.push((ErrorKind::MaxDate, vec![("maxDate", raw.clone())]));
            }
        }
        ComponentKind::SliderRange(props) => check_range(props, value, found),
        _ => {}
    }
}

fn check_bounds(number: f64, min: Option<f64>, max: Option<f64>, found: &mut Found) {
    if let Some(min) = min
        && number < min
    {
        found.push((ErrorKind::Min, vec![("min", format_number(min))]));
    }
    if let Some(max) = max
        && number > max
    {
        found.push((ErrorKind::Max, vec![("max", format_number(max))]));
    }
}

fn check_text(component: &Component, text: &str, found: &mut Found) {
    let rules = &component.validation;
    let length = text.chars().count();
    if let Some(min_length) = rules.min_length
        && length < min_length
    {
        found.push((ErrorKind::MinLength, vec![("minLength", min_length.to_string())]));
    }
    if let Some(max_length) = rules.max_length
        && length > max_length
    {
        found.push((ErrorKind::MaxLength, vec![("maxLength", max_length.to_string())]));
    }
    if let Some(pattern) = &rules.pattern {
        match Regex::new(pattern) {
            Ok(regex) => {
                if !regex.is_match(text) {
                    found.push((ErrorKind::Pattern, vec![("pattern", pattern.clone())]));
                }
            }
            Err(err) => debug!(component = %component.id, %err, "ignoring invalid pattern"),
        }
    }
}

fn check_item_count(component: &Component, count: usize, found: &mut Found) {
    let rules = &component.validation;
    if let Some(min_items) = rules.min_items
        && count < min_items
    {
        found.push((ErrorKind::MinItems, vec![("minItems", min_items.to_string())]));
    }
    if let Some(max_items) = rules.max_items
        && count > max_items
    {
        found.push((ErrorKind::MaxItems, vec![("maxItems", max_items.to_string())]));
    }
}

/// Span and per-end bounds of a `{min, max}` range value. Ends that do not
/// parse are skipped.
fn check_range(props: &SliderRangeProps, value: &Value, found: &mut Found) {
    let low = value.get("min").and_then(to_number);
    let high = value.get("max").and_then(to_number);

    if let (Some(low), Some(high)) = (low, high) {
        let span = high - low;
        if let Some(min_range) = props.min_range
            && span < min_range
        {
            found.push((ErrorKind::MinRange, vec![("minRange", format_number(min_range))]));
        }
        if let Some(max_range) = props.max_range
            && span > max_range
        {
            found.push((ErrorKind::MaxRange, vec![("maxRange", format_number(max_range))]));
        }
    }
    if let Some(low) = low {
        if let Some(bound) = props.min_value_min
            && low < bound
        {
            found.push((ErrorKind::MinValueMin, vec![("minValueMin", format_number(bound))]));
        }
        if let Some(bound) = props.min_value_max
            && low > bound
        {
            found.push((ErrorKind::MinValueMax, vec![("minValueMax", format_number(bound))]));
        }
    }
    if let Some(high) = high {
        if let Some(bound) = props.max_value_min
            && high < bound
        {
            found.push((ErrorKind::MaxValueMin, vec![("maxValueMin", format_number(bound))]));
        }
        if let Some(bound) = props.max_value_max
            && high > bound
        {
            found.push((ErrorKind::MaxValueMax, vec![("maxValueMax", format_number(bound))]));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn format_number(number: f64) -> String {
    number_value(number).to_string()
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` and RFC 3339 timestamps to a
/// calendar date.
pub fn parse_date(text: &str) -> Option<Date> {
    let text = text.trim();
    if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
        return Some(date);
    }
    if let Ok(timestamp) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(timestamp.date());
    }
    if let Ok(local) = PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]")) {
        return Some(local.date());
    }
    PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
        .ok()
        .map(|local| local.date())
}
