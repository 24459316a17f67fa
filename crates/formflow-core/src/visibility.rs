use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::computed::ExpressionOverrides;
use crate::spec::component::Component;
use crate::spec::condition::{ConditionOperator, VisibilityCondition};
use crate::values::FormValues;

pub type VisibilityMap = BTreeMap<String, bool>;

/// AND-combination of conditions. An empty list is visible.
pub fn is_visible(conditions: &[VisibilityCondition], values: &FormValues) -> bool {
    conditions
        .iter()
        .all(|condition| condition_holds(condition, values))
}

/// Evaluates one condition. A referenced field that is absent never matches,
/// and numeric operators fail closed when either side does not parse.
pub fn condition_holds(condition: &VisibilityCondition, values: &FormValues) -> bool {
    let Some(actual) = values.lookup(&condition.field) else {
        return false;
    };
    let expected = &condition.value;
    match condition.operator {
        ConditionOperator::Equals => loose_eq(actual, expected),
        ConditionOperator::NotEquals => !loose_eq(actual, expected),
        ConditionOperator::GreaterThan => {
            numeric_ordering(actual, expected).is_some_and(Ordering::is_gt)
        }
        ConditionOperator::LessThan => {
            numeric_ordering(actual, expected).is_some_and(Ordering::is_lt)
        }
        ConditionOperator::GreaterThanOrEqual => {
            numeric_ordering(actual, expected).is_some_and(Ordering::is_ge)
        }
        ConditionOperator::LessThanOrEqual => {
            numeric_ordering(actual, expected).is_some_and(Ordering::is_le)
        }
    }
}

fn numeric_ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    to_number(actual)?.partial_cmp(&to_number(expected)?)
}

/// Equality with scalar coercion: `"5" == 5`, `"true" == true`; an array
/// matches a scalar it contains.
pub fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Array(items), scalar) if !scalar.is_array() => {
            items.iter().any(|item| loose_eq(item, scalar))
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (to_number(actual), to_number(expected)) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            }
        }
        (Value::Bool(flag), Value::String(text)) | (Value::String(text), Value::Bool(flag)) => {
            text.trim().eq_ignore_ascii_case(if *flag { "true" } else { "false" })
        }
        _ => false,
    }
}

pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
            }
        }
        _ => None,
    }
}

/// Visibility of every component in a tree. Children of a hidden container are
/// hidden; expression overrides in visibility mode take precedence over the
/// declarative conditions.
pub fn resolve_visibility(
    components: &[Component],
    values: &FormValues,
    overrides: Option<&ExpressionOverrides>,
) -> VisibilityMap {
    let mut map = VisibilityMap::new();
    collect_visibility(components, values, overrides, true, &mut map);
    map
}

fn collect_visibility(
    components: &[Component],
    values: &FormValues,
    overrides: Option<&ExpressionOverrides>,
    parent_visible: bool,
    map: &mut VisibilityMap,
) {
    for component in components {
        let visible = parent_visible && component_visible(component, values, overrides);
        map.insert(component.id.clone(), visible);
        collect_visibility(component.kind.children(), values, overrides, visible, map);
    }
}

pub fn component_visible(
    component: &Component,
    values: &FormValues,
    overrides: Option<&ExpressionOverrides>,
) -> bool {
    if let Some(visible) = overrides.and_then(|overrides| overrides.visible(&component.id)) {
        return visible;
    }
    is_visible(&component.visibility_conditions, values)
}
