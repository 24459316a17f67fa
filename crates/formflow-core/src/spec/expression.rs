use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How the result of a field expression is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ExpressionMode {
    #[default]
    Value,
    Visibility,
    Validation,
    Disabled,
    Required,
    Label,
    HelperText,
}

/// Expression attached to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionConfig {
    pub expression: String,
    #[serde(default)]
    pub mode: ExpressionMode,
    /// Explicit dependency paths. When empty they are inferred from the expression.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(default = "default_cache")]
    pub cache: bool,
}

fn default_cache() -> bool {
    true
}

impl ExpressionConfig {
    pub fn new(expression: impl Into<String>, mode: ExpressionMode) -> Self {
        Self {
            expression: expression.into(),
            mode,
            dependencies: Vec::new(),
            debounce_ms: None,
            cache: true,
        }
    }
}
