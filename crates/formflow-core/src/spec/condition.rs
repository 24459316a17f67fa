use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators accepted by visibility conditions and page branches.
/// Word names are canonical; the symbolic forms are read as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionOperator {
    #[serde(rename = "equals", alias = "==")]
    Equals,
    #[serde(rename = "notEquals", alias = "!=")]
    NotEquals,
    #[serde(rename = "greaterThan", alias = ">")]
    GreaterThan,
    #[serde(rename = "lessThan", alias = "<")]
    LessThan,
    #[serde(rename = "greaterThanOrEqual", alias = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "lessThanOrEqual", alias = "<=")]
    LessThanOrEqual,
}

/// A single field-level condition; lists of conditions are AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisibilityCondition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl VisibilityCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}
