use serde_json::{Value, json};

use formflow_core::spec::{Component, ComponentKind, ConditionOperator, InputType, VisibilityCondition};
use formflow_core::{FormValues, is_visible, resolve_visibility};

fn conditions(list: Value) -> Vec<VisibilityCondition> {
    serde_json::from_value(list).expect("conditions")
}

fn shown(list: Value, values: Value) -> bool {
    is_visible(&conditions(list), &FormValues::from_value(values))
}

fn components(list: Value) -> Vec<Component> {
    serde_json::from_value(list).expect("components")
}

#[test]
fn ordering_operators_compare_numerically() {
    let values = json!({ "age": 18, "score": "7.5" });
    assert!(shown(json!([{ "field": "age", "operator": "greaterThan", "value": 17 }]), values.clone()));
    assert!(!shown(json!([{ "field": "age", "operator": "greaterThan", "value": 18 }]), values.clone()));
    assert!(shown(json!([{ "field": "age", "operator": "lessThan", "value": "20" }]), values.clone()));
    assert!(!shown(json!([{ "field": "age", "operator": "lessThan", "value": 18 }]), values.clone()));
    assert!(shown(json!([{ "field": "age", "operator": ">=", "value": 18 }]), values.clone()));
    assert!(!shown(json!([{ "field": "age", "operator": ">=", "value": 19 }]), values.clone()));
    assert!(shown(json!([{ "field": "score", "operator": "<=", "value": 7.5 }]), values.clone()));
    assert!(!shown(json!([{ "field": "score", "operator": "<=", "value": 7 }]), values));
}

#[test]
fn symbolic_operators_behave_like_their_word_forms() {
    let values = json!({ "plan": "pro", "seats": 5 });
    assert!(shown(json!([{ "field": "plan", "operator": "==", "value": "pro" }]), values.clone()));
    assert!(!shown(json!([{ "field": "plan", "operator": "!=", "value": "pro" }]), values.clone()));
    assert!(shown(json!([{ "field": "plan", "operator": "!=", "value": "free" }]), values.clone()));
    assert!(shown(json!([{ "field": "seats", "operator": ">", "value": 4 }]), values.clone()));
    assert!(!shown(json!([{ "field": "seats", "operator": "<", "value": 5 }]), values));
}

#[test]
fn operators_serialize_with_word_names() {
    let parsed = conditions(json!([
        { "field": "a", "operator": ">=", "value": 1 },
        { "field": "a", "operator": "greaterThanOrEqual", "value": 1 },
        { "field": "a", "operator": "<=", "value": 1 },
        { "field": "a", "operator": "lessThanOrEqual", "value": 1 },
        { "field": "a", "operator": "==", "value": 1 }
    ]));
    assert_eq!(parsed[0], parsed[1]);
    assert_eq!(parsed[2], parsed[3]);
    assert_eq!(parsed[0].operator, ConditionOperator::GreaterThanOrEqual);

    let names: Vec<Value> = parsed
        .iter()
        .map(|condition| serde_json::to_value(condition.operator).expect("serialize"))
        .collect();
    assert_eq!(
        names,
        vec![
            json!("greaterThanOrEqual"),
            json!("greaterThanOrEqual"),
            json!("lessThanOrEqual"),
            json!("lessThanOrEqual"),
            json!("equals"),
        ]
    );
}

#[test]
fn numeric_operators_fail_closed_on_non_numbers() {
    let values = json!({ "name": "abc", "age": 30, "blank": "" });
    assert!(!shown(json!([{ "field": "name", "operator": ">", "value": 1 }]), values.clone()));
    assert!(!shown(json!([{ "field": "name", "operator": "<=", "value": 1 }]), values.clone()));
    assert!(!shown(json!([{ "field": "age", "operator": "greaterThan", "value": "abc" }]), values.clone()));
    assert!(!shown(json!([{ "field": "age", "operator": "lessThan", "value": "abc" }]), values.clone()));
    assert!(!shown(json!([{ "field": "blank", "operator": "lessThan", "value": 1 }]), values));
}

#[test]
fn absent_fields_never_match() {
    let values = json!({ "other": 1 });
    assert!(!shown(json!([{ "field": "missing", "operator": "notEquals", "value": "x" }]), values.clone()));
    assert!(!shown(json!([{ "field": "missing", "operator": "equals", "value": null }]), values.clone()));
    assert!(!shown(json!([{ "field": "missing", "operator": "lessThan", "value": 5 }]), values));
}

#[test]
fn conditions_are_and_combined() {
    let values = json!({ "country": "NL", "age": 16 });
    let list = json!([
        { "field": "country", "operator": "equals", "value": "NL" },
        { "field": "age", "operator": ">=", "value": 18 }
    ]);
    assert!(!shown(list, values.clone()));

    let list = json!([
        { "field": "country", "operator": "equals", "value": "NL" },
        { "field": "age", "operator": "<", "value": 18 }
    ]);
    assert!(shown(list, values.clone()));
    assert!(shown(json!([]), values));
}

#[test]
fn equality_coerces_scalars_and_searches_lists() {
    let values = json!({ "qty": "5", "agree": true, "colors": ["red", "blue"] });
    assert!(shown(json!([{ "field": "qty", "operator": "equals", "value": 5 }]), values.clone()));
    assert!(shown(json!([{ "field": "agree", "operator": "equals", "value": "true" }]), values.clone()));
    assert!(shown(json!([{ "field": "colors", "operator": "equals", "value": "blue" }]), values.clone()));
    assert!(shown(json!([{ "field": "colors", "operator": "notEquals", "value": "green" }]), values));
}

#[test]
fn hidden_containers_hide_their_children() {
    let tree = components(json!([
        { "id": "toggle", "type": "checkbox", "label": "Show more" },
        {
            "id": "more",
            "type": "section",
            "visibilityConditions": [ { "field": "toggle", "operator": "equals", "value": true } ],
            "children": [ { "id": "detail", "type": "input", "label": "Detail" } ]
        }
    ]));

    let hidden = resolve_visibility(&tree, &FormValues::from_value(json!({ "toggle": false })), None);
    assert_eq!(hidden["toggle"], true);
    assert_eq!(hidden["more"], false);
    assert_eq!(hidden["detail"], false);

    let visible = resolve_visibility(&tree, &FormValues::from_value(json!({ "toggle": true })), None);
    assert_eq!(visible["more"], true);
    assert_eq!(visible["detail"], true);
}

#[test]
fn unknown_input_types_fall_back_to_text() {
    let tree = components(json!([
        { "id": "a", "type": "input", "props": { "inputType": "color" } },
        { "id": "b", "type": "input", "props": { "inputType": "number" } },
        { "id": "c", "type": "input" }
    ]));
    let types: Vec<InputType> = tree
        .iter()
        .map(|component| match &component.kind {
            ComponentKind::Input(props) => props.input_type,
            other => panic!("expected input, got {other:?}"),
        })
        .collect();
    assert_eq!(types, vec![InputType::Text, InputType::Number, InputType::Text]);
}
