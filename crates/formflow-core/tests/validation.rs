use std::collections::BTreeMap;

use serde_json::{Value, json};

use formflow_core::{
    FormDefinition, FormValues, MessageResolver, TranslationService, ValidationErrors, Validator,
};

fn single_page(components: Value) -> FormDefinition {
    FormDefinition::from_value(json!({
        "app": { "pages": [ { "id": "page", "components": components } ] }
    }))
    .expect("definition")
}

fn validate(form: &FormDefinition, values: Value) -> ValidationErrors {
    validate_with(form, values, &TranslationService::default(), &BTreeMap::new())
}

fn validate_with(
    form: &FormDefinition,
    values: Value,
    translations: &TranslationService,
    custom_texts: &BTreeMap<String, String>,
) -> ValidationErrors {
    let validator = Validator::new(MessageResolver::new(translations, custom_texts));
    validator.validate_page(&form.pages[0], &FormValues::from_value(values))
}

#[test]
fn required_accepts_zero_and_false() {
    let form = single_page(json!([
        { "id": "count", "type": "input", "label": "Count", "validation": { "required": true } },
        { "id": "agree", "type": "checkbox", "label": "Agree", "validation": { "required": true } }
    ]));
    assert!(validate(&form, json!({ "count": 0, "agree": false })).is_empty());
}

#[test]
fn required_rejects_blank_values() {
    let form = single_page(json!([
        { "id": "name", "type": "input", "label": "Name", "validation": { "required": true } }
    ]));
    for blank in [json!(""), json!("   "), Value::Null] {
        let errors = validate(&form, json!({ "name": blank }));
        assert_eq!(errors["name"], vec!["Name is required".to_string()]);
    }
    let errors = validate(&form, json!({}));
    assert!(errors.contains_key("name"));
}

#[test]
fn hidden_fields_are_not_validated() {
    let form = single_page(json!([
        { "id": "hasPet", "type": "radio", "props": { "options": ["yes", "no"] } },
        {
            "id": "petName",
            "type": "input",
            "label": "Pet name",
            "validation": { "required": true },
            "visibilityConditions": [ { "field": "hasPet", "operator": "equals", "value": "yes" } ]
        }
    ]));
    assert!(validate(&form, json!({ "hasPet": "no", "petName": "" })).is_empty());
    assert!(validate(&form, json!({ "hasPet": "yes", "petName": "" })).contains_key("petName"));
}

#[test]
fn sections_share_the_page_scope() {
    let form = single_page(json!([
        {
            "id": "address",
            "type": "section",
            "children": [
                { "id": "city", "type": "input", "label": "City", "validation": { "required": true } }
            ]
        }
    ]));
    let errors = validate(&form, json!({ "city": "" }));
    assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["city"]);
}

#[test]
fn array_items_are_validated_with_indexed_paths() {
    let form = single_page(json!([
        {
            "id": "people",
            "type": "array",
            "label": "People",
            "validation": { "minItems": 1, "maxItems": 2 },
            "arrayItems": [
                { "id": "name", "type": "input", "label": "Name", "validation": { "required": true } },
                { "id": "age", "type": "input", "label": "Age", "props": { "inputType": "number", "min": 0 } }
            ]
        }
    ]));

    let errors = validate(&form, json!({ "people": [] }));
    assert_eq!(errors["people"], vec!["People requires at least 1 items".to_string()]);

    let errors = validate(
        &form,
        json!({ "people": [ { "name": "Ann", "age": 30 }, { "name": "", "age": -1 } ] }),
    );
    assert!(!errors.contains_key("people"));
    assert!(!errors.contains_key("people[0].name"));
    assert_eq!(errors["people[1].name"], vec!["Name is required".to_string()]);
    assert_eq!(errors["people[1].age"], vec!["Age must be at least 0".to_string()]);

    let three = json!({ "people": [ { "name": "a" }, { "name": "b" }, { "name": "c" } ] });
    assert_eq!(
        validate(&form, three)["people"],
        vec!["People allows at most 2 items".to_string()]
    );
}

#[test]
fn text_rules() {
    let form = single_page(json!([
        { "id": "email", "type": "input", "label": "Email", "props": { "inputType": "email" } },
        { "id": "code", "type": "input", "label": "Code", "validation": { "minLength": 3, "maxLength": 5, "pattern": "^[A-Z]+$" } },
        { "id": "loose", "type": "input", "validation": { "pattern": "([" } }
    ]));

    let errors = validate(&form, json!({ "email": "not-an-email", "code": "ab", "loose": "anything" }));
    assert_eq!(errors["email"], vec!["Email must be a valid email address".to_string()]);
    assert_eq!(
        errors["code"],
        vec![
            "Code must be at least 3 characters".to_string(),
            "Code has an invalid format".to_string(),
        ]
    );
    assert!(!errors.contains_key("loose"));

    assert!(validate(&form, json!({ "email": "a@b.co", "code": "ABCD" })).is_empty());
}

#[test]
fn number_bounds_prefer_validation_rules() {
    let form = single_page(json!([
        {
            "id": "age",
            "type": "input",
            "label": "Age",
            "props": { "inputType": "number", "min": 0, "max": 150 },
            "validation": { "min": 18 }
        }
    ]));
    assert_eq!(validate(&form, json!({ "age": 10 }))["age"], vec!["Age must be at least 18".to_string()]);
    assert_eq!(validate(&form, json!({ "age": "200" }))["age"], vec!["Age must be at most 150".to_string()]);
    assert_eq!(validate(&form, json!({ "age": "old" }))["age"], vec!["Age must be a number".to_string()]);
    assert!(validate(&form, json!({ "age": 40 })).is_empty());
}

#[test]
fn date_rules() {
    let form = single_page(json!([
        {
            "id": "start",
            "type": "date",
            "label": "Start",
            "props": { "minDate": "2024-01-01" },
            "validation": { "maxDate": "2024-12-31" }
        }
    ]));
    assert_eq!(validate(&form, json!({ "start": "soon" }))["start"], vec!["Start must be a valid date".to_string()]);
    assert_eq!(
        validate(&form, json!({ "start": "2023-06-01" }))["start"],
        vec!["Start must be on or after 2024-01-01".to_string()]
    );
    assert_eq!(
        validate(&form, json!({ "start": "2025-01-01T09:30:00Z" }))["start"],
        vec!["Start must be on or before 2024-12-31".to_string()]
    );
    assert!(validate(&form, json!({ "start": "2024-05-05T10:00" })).is_empty());
}

#[test]
fn slider_range_rules() {
    let form = single_page(json!([
        {
            "id": "budget",
            "type": "slider-range",
            "label": "Budget",
            "props": { "min": 0, "max": 1000, "minRange": 100, "maxValueMax": 800 }
        }
    ]));
    let errors = validate(&form, json!({ "budget": { "min": 100, "max": 150 } }));
    assert_eq!(errors["budget"], vec!["Budget range must span at least 100".to_string()]);

    let errors = validate(&form, json!({ "budget": { "min": 0, "max": 900 } }));
    assert_eq!(errors["budget"], vec!["Budget maximum must be at most 800".to_string()]);

    assert!(validate(&form, json!({ "budget": { "min": 0, "max": 500 } })).is_empty());
}

#[test]
fn multi_choice_item_counts() {
    let form = single_page(json!([
        {
            "id": "toppings",
            "type": "checkbox",
            "label": "Toppings",
            "props": { "options": ["cheese", "ham", "olives"] },
            "validation": { "required": true, "maxItems": 2 }
        }
    ]));
    assert_eq!(validate(&form, json!({ "toppings": [] }))["toppings"], vec!["Toppings is required".to_string()]);
    assert_eq!(
        validate(&form, json!({ "toppings": ["cheese", "ham", "olives"] }))["toppings"],
        vec!["Toppings allows at most 2 items".to_string()]
    );
}

#[test]
fn messages_come_from_translation_then_component_then_custom_texts() {
    let form = single_page(json!([
        {
            "id": "name",
            "type": "input",
            "label": "Name",
            "validation": { "required": true, "errorMessages": { "required": "Tell us {fieldLabel}" } }
        },
        { "id": "city", "type": "input", "label": "City", "validation": { "required": true } }
    ]));
    let values = json!({ "name": "", "city": "" });

    let mut custom_texts = BTreeMap::new();
    custom_texts.insert("validation.required".to_string(), "{fieldLabel}?".to_string());
    let errors = validate_with(&form, values.clone(), &TranslationService::default(), &custom_texts);
    assert_eq!(errors["name"], vec!["Tell us Name".to_string()]);
    assert_eq!(errors["city"], vec!["City?".to_string()]);

    let mut dutch = BTreeMap::new();
    dutch.insert("validation.required".to_string(), "{fieldLabel} is verplicht".to_string());
    dutch.insert("components.city.label".to_string(), "Stad".to_string());
    let mut translations = BTreeMap::new();
    translations.insert("nl".to_string(), dutch);
    let service = TranslationService::new(translations, Some("nl-BE".to_string()));
    let errors = validate_with(&form, values, &service, &custom_texts);
    assert_eq!(errors["name"], vec!["Name is verplicht".to_string()]);
    assert_eq!(errors["city"], vec!["Stad is verplicht".to_string()]);
}
