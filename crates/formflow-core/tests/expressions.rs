use serde_json::{Value, json};

use formflow_core::spec::{ExpressionConfig, ExpressionMode};
use formflow_core::{
    ExpressionContext, ExpressionEngine, ExpressionErrorKind, ExpressionEvaluator, FormDefinition,
    FormSession, FormSettings, FormValues, ManualClock, NavigationOutcome, ValidationErrors,
};

fn form(components: Value) -> FormDefinition {
    FormDefinition::from_value(json!({
        "app": {
            "pages": [
                { "id": "first", "nextPage": "second", "components": components },
                { "id": "second", "components": [] }
            ]
        }
    }))
    .expect("definition")
}

fn evaluate(expression: &str, values: Value) -> Value {
    let config = ExpressionConfig::new(expression, ExpressionMode::Value);
    let ctx = ExpressionContext::new(FormValues::from_value(values));
    let result = ExpressionEvaluator::new().evaluate(&config, &ctx);
    assert!(result.success, "{expression}: {:?}", result.error);
    result.value
}

#[test]
fn evaluates_field_arithmetic_and_logic() {
    let values = json!({ "price": 12.5, "qty": "2", "vip": true, "name": "ann" });
    assert_eq!(evaluate("price * qty", values.clone()), json!(25));
    assert_eq!(evaluate("vip && qty >= 2 ? 'gold' : 'basic'", values.clone()), json!("gold"));
    assert_eq!(evaluate("upper(name) + '!'", values.clone()), json!("ANN!"));
    assert_eq!(evaluate("round(price / 3, 1)", values), json!(4.2));
}

#[test]
fn evaluator_reports_error_kinds() {
    let ctx = ExpressionContext::new(FormValues::from_value(json!({ "a": 1 })));
    let evaluator = ExpressionEvaluator::new();
    let kind = |source: &str| {
        evaluator
            .evaluate(&ExpressionConfig::new(source, ExpressionMode::Value), &ctx)
            .error
            .map(|err| err.kind())
    };
    assert_eq!(kind("a +"), Some(ExpressionErrorKind::Syntax));
    assert_eq!(kind("missing + 1"), Some(ExpressionErrorKind::Reference));
    assert_eq!(kind("a / 0"), Some(ExpressionErrorKind::Runtime));
    assert_eq!(kind("nosuch(a)"), Some(ExpressionErrorKind::Reference));
    assert_eq!(kind("a + 1"), None);
}

#[test]
fn step_budget_turns_into_timeout() {
    let ctx = ExpressionContext::new(FormValues::new());
    let config = ExpressionConfig::new("1 + 2 + 3 + 4 + 5 + 6", ExpressionMode::Value);
    let result = ExpressionEvaluator::with_step_budget(3).evaluate(&config, &ctx);
    assert_eq!(result.error.map(|err| err.kind()), Some(ExpressionErrorKind::Timeout));
}

#[test]
fn value_expressions_feed_the_values_map_in_dependency_order() {
    let definition = form(json!([
        { "id": "total", "type": "input", "expression": { "expression": "subtotal + shipping" } },
        { "id": "subtotal", "type": "input", "expression": { "expression": "price * qty" } },
        { "id": "shipping", "type": "input", "props": { "defaultValue": 5 } },
        { "id": "price", "type": "input", "props": { "defaultValue": 10 } },
        { "id": "qty", "type": "input", "props": { "defaultValue": 3 } }
    ]));
    let mut engine = ExpressionEngine::new(&definition);
    assert_eq!(engine.evaluation_order(), vec!["subtotal", "total"]);

    let mut values = formflow_core::values::initial_values(&definition);
    let overrides = engine.evaluate(&mut values, &ValidationErrors::new());
    assert_eq!(values.get("subtotal"), Some(&json!(30)));
    assert_eq!(values.get("total"), Some(&json!(35)));
    assert_eq!(overrides.value("total"), Some(&json!(35)));
}

#[test]
fn circular_dependencies_are_reported_on_every_member() {
    let definition = form(json!([
        { "id": "a", "type": "input", "expression": { "expression": "b + 1" } },
        { "id": "b", "type": "input", "expression": { "expression": "a + 1" } },
        { "id": "c", "type": "input", "expression": { "expression": "1 + 1" } }
    ]));
    let session = FormSession::new(definition, FormSettings::default());
    let errors = session.expression_errors();
    assert_eq!(errors["a"].kind(), ExpressionErrorKind::Circular);
    assert_eq!(errors["b"].kind(), ExpressionErrorKind::Circular);
    assert!(!errors.contains_key("c"));
    assert_eq!(session.values().get("c"), Some(&json!(2)));
}

#[test]
fn deeply_nested_expressions_fail_to_parse_instead_of_overflowing() {
    let nested = format!("{}a{}", "(".repeat(3_000), ")".repeat(3_000));
    let definition = form(json!([
        { "id": "a", "type": "input", "props": { "defaultValue": 1 } },
        { "id": "b", "type": "input", "expression": { "expression": nested } },
        { "id": "c", "type": "input", "expression": { "expression": "(((a))) + 1" } }
    ]));
    let session = FormSession::new(definition, FormSettings::default());
    let errors = session.expression_errors();
    assert_eq!(errors["b"].kind(), ExpressionErrorKind::Syntax);
    assert!(!errors.contains_key("c"));
    assert_eq!(session.values().get("c"), Some(&json!(2)));
}

#[test]
fn visibility_expressions_hide_required_fields() {
    let definition = form(json!([
        { "id": "hasDetails", "type": "checkbox", "label": "More details?" },
        {
            "id": "details",
            "type": "textarea",
            "label": "Details",
            "validation": { "required": true },
            "expression": { "expression": "hasDetails == true", "mode": "visibility" }
        }
    ]));
    let mut session = FormSession::new(definition, FormSettings::default());
    assert_eq!(session.visibility().get("details"), Some(&false));

    session.set_value("hasDetails", json!(true));
    assert_eq!(session.visibility().get("details"), Some(&true));
    assert!(matches!(session.next(), NavigationOutcome::Blocked { .. }));

    session.set_value("hasDetails", json!(false));
    assert!(matches!(session.next(), NavigationOutcome::Moved { .. }));
}

#[test]
fn required_and_label_expressions_shape_validation() {
    let definition = form(json!([
        { "id": "country", "type": "select", "props": { "options": ["NL", "US"] } },
        {
            "id": "state",
            "type": "input",
            "label": "Region",
            "expression": { "expression": "country == 'US'", "mode": "required" }
        },
        {
            "id": "stateLabel",
            "type": "text",
            "expression": { "expression": "country == 'US' ? 'State' : 'Province'", "mode": "label" }
        }
    ]));
    let mut session = FormSession::new(definition, FormSettings::default());
    assert!(session.errors().is_empty());

    session.set_value("country", json!("US"));
    assert_eq!(session.errors()["state"], vec!["Region is required".to_string()]);
    assert_eq!(session.overrides().label("stateLabel"), Some("State"));
}

#[test]
fn debounced_expressions_wait_for_the_clock() {
    let definition = form(json!([
        { "id": "price", "type": "input", "props": { "inputType": "number" } },
        { "id": "qty", "type": "input", "props": { "inputType": "number" } },
        { "id": "total", "type": "input", "expression": { "expression": "price * qty", "debounceMs": 300 } }
    ]));
    let clock = ManualClock::new(0);
    let mut session = FormSession::new(definition, FormSettings::default()).with_clock(clock.clone());
    assert_eq!(session.values().get("total"), Some(&json!(0)));

    session.set_value("price", json!(2));
    clock.advance(200);
    session.set_value("qty", json!(3));
    assert_eq!(session.pending_debounces(), 1);

    clock.advance(200);
    assert!(session.poll_expressions().is_empty());
    assert_eq!(session.values().get("total"), Some(&json!(0)));

    clock.advance(100);
    assert_eq!(session.poll_expressions(), vec!["total".to_string()]);
    assert_eq!(session.values().get("total"), Some(&json!(6)));
    assert_eq!(session.pending_debounces(), 0);
}

#[test]
fn replacing_the_definition_cancels_pending_evaluations() {
    let definition = form(json!([
        { "id": "a", "type": "input" },
        { "id": "b", "type": "input", "expression": { "expression": "a", "debounceMs": 50 } }
    ]));
    let clock = ManualClock::new(0);
    let mut session = FormSession::new(definition.clone(), FormSettings::default()).with_clock(clock.clone());
    session.set_value("a", json!("x"));
    assert_eq!(session.pending_debounces(), 1);

    session.load_definition(definition);
    assert_eq!(session.pending_debounces(), 0);
    clock.advance(100);
    assert!(session.poll_expressions().is_empty());
}
