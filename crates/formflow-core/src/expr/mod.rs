//! Sandboxed expression language for computed fields.
//!
//! Expressions are small infix programs (`price * quantity`,
//! `len(values.items) > 2 ? 'many' : 'few'`) evaluated against a read-only
//! [`ExpressionContext`]. Evaluation is bounded by a step budget so a
//! pathological expression reports a timeout instead of stalling a render pass.

mod parser;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::spec::expression::ExpressionConfig;
use crate::values::{FormValues, is_empty_value, parse_path, PathSegment};
use crate::visibility::to_number;

pub use parser::{BinaryOp, Expr, UnaryOp, parse};
pub(crate) use parser::number_value;

pub const DEFAULT_STEP_BUDGET: usize = 10_000;

const NAMESPACES: [&str; 4] = ["values.", "validation.", "required.", "errors."];
const SELF_REFERENCES: [&str; 2] = ["$value", "this"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown reference '{0}'")]
    Reference(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<String>),
    #[error("evaluation exceeded {0} steps")]
    Timeout(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionErrorKind {
    Syntax,
    Reference,
    Type,
    Runtime,
    Circular,
    Timeout,
}

impl ExpressionError {
    pub fn kind(&self) -> ExpressionErrorKind {
        match self {
            ExpressionError::Syntax(_) => ExpressionErrorKind::Syntax,
            ExpressionError::Reference(_) => ExpressionErrorKind::Reference,
            ExpressionError::Type(_) => ExpressionErrorKind::Type,
            ExpressionError::Runtime(_) => ExpressionErrorKind::Runtime,
            ExpressionError::Circular(_) => ExpressionErrorKind::Circular,
            ExpressionError::Timeout(_) => ExpressionErrorKind::Timeout,
        }
    }
}

/// Read-only state an expression can observe.
///
/// Bare identifiers and `values.<path>` read field values. `validation.<id>`,
/// `required.<id>` and `errors.<id>` read the per-field flags and the first
/// error message. `$value` / `this` read the value currently held by the field
/// that owns the expression.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    values: FormValues,
    validation: BTreeMap<String, bool>,
    required: BTreeMap<String, bool>,
    errors: BTreeMap<String, String>,
    known_fields: BTreeSet<String>,
    current: Option<Value>,
}

impl ExpressionContext {
    pub fn new(values: FormValues) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Field ids that resolve to `null` instead of a reference error when no
    /// value is stored for them yet.
    pub fn with_known_fields(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        self.known_fields.extend(fields);
        self
    }

    pub fn with_validation(mut self, validation: BTreeMap<String, bool>) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_required(mut self, required: BTreeMap<String, bool>) -> Self {
        self.required = required;
        self
    }

    pub fn with_errors(mut self, errors: BTreeMap<String, String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut FormValues {
        &mut self.values
    }

    pub fn set_current(&mut self, current: Option<Value>) {
        self.current = current;
    }

    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    /// Reads one identifier path the way an expression would.
    pub fn resolve(&self, path: &str) -> Result<Value, ExpressionError> {
        if SELF_REFERENCES.contains(&path) {
            return Ok(self.current.clone().unwrap_or(Value::Null));
        }
        if let Some(field) = path.strip_prefix("validation.") {
            return Ok(flag(self.validation.get(field)));
        }
        if let Some(field) = path.strip_prefix("required.") {
            return Ok(flag(self.required.get(field)));
        }
        if let Some(field) = path.strip_prefix("errors.") {
            return Ok(self
                .errors
                .get(field)
                .map(|message| Value::String(message.clone()))
                .unwrap_or(Value::Null));
        }
        let field_path = path.strip_prefix("values.").unwrap_or(path);
        if let Some(value) = self.values.lookup(field_path) {
            return Ok(value.clone());
        }
        if path == "value" {
            return Ok(self.current.clone().unwrap_or(Value::Null));
        }
        if self.is_known(field_path) {
            return Ok(Value::Null);
        }
        Err(ExpressionError::Reference(path.to_string()))
    }

    fn is_known(&self, path: &str) -> bool {
        if self.known_fields.contains(path) {
            return true;
        }
        match parse_path(path).first() {
            Some(PathSegment::Key(root)) => self.known_fields.contains(root) || self.values.get(root).is_some(),
            _ => false,
        }
    }
}

fn flag(value: Option<&bool>) -> Value {
    value.map(|flag| Value::Bool(*flag)).unwrap_or(Value::Null)
}

/// Outcome of evaluating one expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionResult {
    pub value: Value,
    pub success: bool,
    pub error: Option<ExpressionError>,
    pub dependencies: Vec<String>,
    /// Whether `value` differs from the field's current value.
    pub should_update: bool,
}

impl ExpressionResult {
    pub fn failure(error: ExpressionError, dependencies: Vec<String>) -> Self {
        Self {
            value: Value::Null,
            success: false,
            error: Some(error),
            dependencies,
            should_update: false,
        }
    }

    /// Boolean reading used by the visibility/validation/disabled/required modes.
    pub fn as_bool(&self) -> Option<bool> {
        self.success.then(|| truthy(&self.value))
    }

    /// Text reading used by the label/helperText modes.
    pub fn as_text(&self) -> Option<String> {
        self.success.then(|| display(&self.value))
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionEvaluator {
    step_budget: usize,
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_budget(step_budget: usize) -> Self {
        Self { step_budget }
    }

    /// Evaluates `config.expression` against `ctx`. Never panics; failures are
    /// reported through [`ExpressionResult::error`].
    pub fn evaluate(&self, config: &ExpressionConfig, ctx: &ExpressionContext) -> ExpressionResult {
        let expr = match parse(&config.expression) {
            Ok(expr) => expr,
            Err(err) => {
                return ExpressionResult::failure(err, config.dependencies.clone());
            }
        };
        let dependencies = if config.dependencies.is_empty() {
            field_references(&expr)
        } else {
            config.dependencies.clone()
        };
        match self.evaluate_expr(&expr, ctx) {
            Ok(value) => {
                let should_update = ctx.current() != Some(&value);
                ExpressionResult {
                    value,
                    success: true,
                    error: None,
                    dependencies,
                    should_update,
                }
            }
            Err(err) => ExpressionResult::failure(err, dependencies),
        }
    }

    pub fn evaluate_expr(&self, expr: &Expr, ctx: &ExpressionContext) -> Result<Value, ExpressionError> {
        let mut run = Evaluation {
            ctx,
            steps: 0,
            budget: self.step_budget,
        };
        run.eval(expr)
    }
}

/// Field paths an expression reads, with namespaces stripped and self
/// references dropped.
pub fn field_references(expr: &Expr) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for reference in expr.references() {
        let Some(field) = field_of(&reference) else {
            continue;
        };
        if !fields.iter().any(|known| known == field) {
            fields.push(field.to_string());
        }
    }
    fields
}

/// Field path behind an identifier, or `None` for self references.
pub fn field_of(reference: &str) -> Option<&str> {
    if SELF_REFERENCES.contains(&reference) {
        return None;
    }
    Some(
        NAMESPACES
            .iter()
            .find_map(|namespace| reference.strip_prefix(namespace))
            .unwrap_or(reference),
    )
}

/// Infers dependencies from an expression string; unparsable input has none.
pub fn infer_dependencies(source: &str) -> Vec<String> {
    parse(source)
        .map(|expr| field_references(&expr))
        .unwrap_or_default()
}

struct Evaluation<'a> {
    ctx: &'a ExpressionContext,
    steps: usize,
    budget: usize,
}

impl Evaluation<'_> {
    fn tick(&mut self) -> Result<(), ExpressionError> {
        self.steps += 1;
        if self.steps > self.budget {
            Err(ExpressionError::Timeout(self.budget))
        } else {
            Ok(())
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ExpressionError> {
        self.tick()?;
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => self.ctx.resolve(path),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Negate => {
                        let number = numeric(&value, "-")?;
                        finite(-number)
                    }
                }
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let left = self.eval(left)?;
                    if !truthy(&left) {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(truthy(&self.eval(right)?)))
                }
                BinaryOp::Or => {
                    let left = self.eval(left)?;
                    if truthy(&left) {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(truthy(&self.eval(right)?)))
                }
                _ => {
                    let left = self.eval(left)?;
                    let right = self.eval(right)?;
                    binary(*op, &left, &right)
                }
            },
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if truthy(&self.eval(condition)?) {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::Call { name, args } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg)?);
                }
                call(name, &evaluated)
            }
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match op {
        BinaryOp::Add => {
            if left.is_string() || right.is_string() {
                return Ok(Value::String(format!("{}{}", display(left), display(right))));
            }
            finite(arith_operand(left, "+")? + arith_operand(right, "+")?)
        }
        BinaryOp::Sub => finite(arith_operand(left, "-")? - arith_operand(right, "-")?),
        BinaryOp::Mul => finite(arith_operand(left, "*")? * arith_operand(right, "*")?),
        BinaryOp::Div => {
            let divisor = arith_operand(right, "/")?;
            if divisor == 0.0 {
                return Err(ExpressionError::Runtime("division by zero".into()));
            }
            finite(arith_operand(left, "/")? / divisor)
        }
        BinaryOp::Rem => {
            let divisor = arith_operand(right, "%")?;
            if divisor == 0.0 {
                return Err(ExpressionError::Runtime("modulo by zero".into()));
            }
            finite(arith_operand(left, "%")? % divisor)
        }
        BinaryOp::Eq => Ok(Value::Bool(equals(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(left, right))),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => compare(op, left, right),
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => truthy(left) && truthy(right),
            _ => truthy(left) || truthy(right),
        })),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Bool(false));
    }
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) if to_number(left).is_none() || to_number(right).is_none() => {
            a.cmp(b)
        }
        _ => {
            let (Some(a), Some(b)) = (scalar_number(left), scalar_number(right)) else {
                return Err(ExpressionError::Type(format!(
                    "cannot compare {} with {}",
                    type_name(left),
                    type_name(right)
                )));
            };
            match a.partial_cmp(&b) {
                Some(ordering) => ordering,
                None => return Ok(Value::Bool(false)),
            }
        }
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Lte => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

fn equals(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => match (to_number(left), to_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::Bool(flag), Value::String(text)) | (Value::String(text), Value::Bool(flag)) => {
            text.trim().eq_ignore_ascii_case(if *flag { "true" } else { "false" })
        }
        _ => false,
    }
}

fn call(name: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    match name {
        "len" | "length" => {
            let [value] = expect_args::<1>(name, args)?;
            let length = match value {
                Value::Null => 0,
                Value::String(text) => text.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(ExpressionError::Type(format!(
                        "len() expects a string or list, got {}",
                        type_name(other)
                    )));
                }
            };
            Ok(Value::from(length))
        }
        "isEmpty" => {
            let [value] = expect_args::<1>(name, args)?;
            Ok(Value::Bool(is_empty_value(Some(value))))
        }
        "round" => {
            let (number, digits) = match args {
                [value] => (numeric(value, name)?, 0),
                [value, digits] => (numeric(value, name)?, numeric(digits, name)? as i32),
                _ => return Err(arity(name, "1 or 2", args.len())),
            };
            let factor = 10f64.powi(digits);
            finite((number * factor).round() / factor)
        }
        "floor" | "ceil" | "abs" => {
            let [value] = expect_args::<1>(name, args)?;
            let number = numeric(value, name)?;
            finite(match name {
                "floor" => number.floor(),
                "ceil" => number.ceil(),
                _ => number.abs(),
            })
        }
        "min" | "max" | "sum" => {
            let numbers = numeric_list(name, args)?;
            if numbers.is_empty() {
                return if name == "sum" {
                    Ok(Value::from(0))
                } else {
                    Ok(Value::Null)
                };
            }
            let folded = match name {
                "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
                "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                _ => numbers.iter().sum(),
            };
            finite(folded)
        }
        "upper" | "lower" | "trim" => {
            let [value] = expect_args::<1>(name, args)?;
            let text = display(value);
            Ok(Value::String(match name {
                "upper" => text.to_uppercase(),
                "lower" => text.to_lowercase(),
                _ => text.trim().to_string(),
            }))
        }
        "contains" => {
            let [haystack, needle] = expect_args::<2>(name, args)?;
            let found = match haystack {
                Value::Array(items) => items.iter().any(|item| equals(item, needle)),
                Value::String(text) => text.contains(&display(needle)),
                Value::Object(map) => map.contains_key(&display(needle)),
                Value::Null => false,
                other => {
                    return Err(ExpressionError::Type(format!(
                        "contains() expects a string or list, got {}",
                        type_name(other)
                    )));
                }
            };
            Ok(Value::Bool(found))
        }
        "concat" => Ok(Value::String(args.iter().map(display).collect())),
        other => Err(ExpressionError::Reference(format!("{other}()"))),
    }
}

fn expect_args<'a, const N: usize>(
    name: &str,
    args: &'a [Value],
) -> Result<&'a [Value; N], ExpressionError> {
    args.try_into()
        .map_err(|_| arity(name, &N.to_string(), args.len()))
}

fn arity(name: &str, expected: &str, actual: usize) -> ExpressionError {
    ExpressionError::Type(format!(
        "{name}() expects {expected} argument(s), got {actual}"
    ))
}

fn numeric_list(name: &str, args: &[Value]) -> Result<Vec<f64>, ExpressionError> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    items
        .iter()
        .filter(|item| !is_empty_value(Some(*item)))
        .map(|item| numeric(item, name))
        .collect()
}

/// Arithmetic operand: `null` and blank strings count as zero.
fn arith_operand(value: &Value, op: &str) -> Result<f64, ExpressionError> {
    if is_empty_value(Some(value)) && !value.is_array() && !value.is_object() {
        return Ok(0.0);
    }
    numeric(value, op)
}

fn numeric(value: &Value, context: &str) -> Result<f64, ExpressionError> {
    scalar_number(value).ok_or_else(|| {
        ExpressionError::Type(format!(
            "{context} expects a number, got {}",
            type_name(value)
        ))
    })
}

fn scalar_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        other => to_number(other),
    }
}

fn finite(number: f64) -> Result<Value, ExpressionError> {
    if number.is_finite() {
        Ok(number_value(number))
    } else {
        Err(ExpressionError::Runtime("result is not a finite number".into()))
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Plain-text rendering used for string concatenation and label results.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::spec::expression::ExpressionMode;

    fn ctx(values: Value) -> ExpressionContext {
        ExpressionContext::new(FormValues::from_value(values))
    }

    fn eval(source: &str, values: Value) -> Result<Value, ExpressionError> {
        let expr = parse(source)?;
        ExpressionEvaluator::new().evaluate_expr(&expr, &ctx(values))
    }

    #[test]
    fn arithmetic_coerces_numeric_strings() {
        assert_eq!(eval("price * qty", json!({"price": "2.5", "qty": 4})), Ok(json!(10)));
        assert_eq!(eval("7 % 3 + 1", json!({})), Ok(json!(2)));
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(
            eval("first + ' ' + last", json!({"first": "Ada", "last": "Lovelace"})),
            Ok(json!("Ada Lovelace"))
        );
    }

    #[test]
    fn namespaces_resolve_flags() {
        let context = ctx(json!({"age": 20}))
            .with_validation(BTreeMap::from([("age".to_string(), true)]))
            .with_errors(BTreeMap::from([("name".to_string(), "Name is required".to_string())]));
        let expr = parse("validation.age && values.age >= 18 ? errors.name : 'none'").expect("parse");
        assert_eq!(
            ExpressionEvaluator::new().evaluate_expr(&expr, &context),
            Ok(json!("Name is required"))
        );
    }

    #[test]
    fn unknown_field_is_a_reference_error() {
        let err = eval("missing + 1", json!({})).expect_err("reference");
        assert_eq!(err.kind(), ExpressionErrorKind::Reference);
    }

    #[test]
    fn known_field_without_value_reads_null() {
        let context = ctx(json!({})).with_known_fields(["nickname".to_string()]);
        let expr = parse("isEmpty(nickname)").expect("parse");
        assert_eq!(
            ExpressionEvaluator::new().evaluate_expr(&expr, &context),
            Ok(json!(true))
        );
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        let err = eval("1 / zero", json!({"zero": 0})).expect_err("runtime");
        assert_eq!(err.kind(), ExpressionErrorKind::Runtime);
    }

    #[test]
    fn comparing_list_with_number_is_type_error() {
        let err = eval("tags > 1", json!({"tags": ["a"]})).expect_err("type");
        assert_eq!(err.kind(), ExpressionErrorKind::Type);
    }

    #[test]
    fn step_budget_reports_timeout() {
        let config = ExpressionConfig::new("a + a + a + a + a + a", ExpressionMode::Value);
        let result = ExpressionEvaluator::with_step_budget(4).evaluate(&config, &ctx(json!({"a": 1})));
        assert!(!result.success);
        assert_eq!(result.error, Some(ExpressionError::Timeout(4)));
    }

    #[test]
    fn functions_cover_lists_and_text() {
        let values = json!({"items": [1, 2, 3], "name": "  Ada "});
        assert_eq!(eval("sum(items)", values.clone()), Ok(json!(6)));
        assert_eq!(eval("max(items) - min(items)", values.clone()), Ok(json!(2)));
        assert_eq!(eval("upper(trim(name))", values.clone()), Ok(json!("ADA")));
        assert_eq!(eval("contains(items, 2)", values.clone()), Ok(json!(true)));
        assert_eq!(eval("round(2.346, 2)", values), Ok(json!(2.35)));
    }

    #[test]
    fn dependencies_are_inferred_without_namespaces() {
        let config = ExpressionConfig::new("values.a + b > 3 && validation.c", ExpressionMode::Visibility);
        let result = ExpressionEvaluator::new().evaluate(&config, &ctx(json!({"a": 1, "b": 5, "c": ""})));
        assert_eq!(result.dependencies, vec!["a", "b", "c"]);
        assert_eq!(result.as_bool(), Some(false));
    }

    #[test]
    fn should_update_tracks_current_value() {
        let config = ExpressionConfig::new("a * 2", ExpressionMode::Value);
        let mut context = ctx(json!({"a": 2}));
        context.set_current(Some(json!(4)));
        let result = ExpressionEvaluator::new().evaluate(&config, &context);
        assert!(result.success);
        assert!(!result.should_update);
    }
}
