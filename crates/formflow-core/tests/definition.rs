use serde_json::{Value, json};

use formflow_core::values::initial_values;
use formflow_core::{
    DefinitionError, FormDefinition, FormEvent, FormSession, FormSettings, ResolvedOptions,
    confirmation_summary, definition_schema,
};

fn load(document: Value) -> Result<FormDefinition, DefinitionError> {
    FormDefinition::from_value(document)
}

fn survey() -> FormDefinition {
    load(json!({
        "app": {
            "id": "survey",
            "title": "Survey",
            "dataSources": {
                "sizes": { "type": "static", "options": [ { "value": "s", "label": "Small" }, { "value": "l", "label": "Large" } ] },
                "cities": { "type": "remote", "url": "https://example.com/cities" }
            },
            "pages": [
                {
                    "id": "about",
                    "title": "About you",
                    "nextPage": "prefs",
                    "components": [
                        { "id": "name", "type": "input", "label": "Name" },
                        { "id": "age", "type": "input", "label": "Age", "props": { "inputType": "number", "defaultValue": 30 } },
                        { "id": "intro", "type": "text", "props": { "content": "Welcome" } },
                        {
                            "id": "extra",
                            "type": "section",
                            "children": [ { "id": "newsletter", "type": "checkbox", "label": "Newsletter" } ]
                        }
                    ]
                },
                {
                    "id": "prefs",
                    "title": "Preferences",
                    "components": [
                        { "id": "size", "type": "select", "label": "Size", "props": { "dataSource": "sizes" } },
                        { "id": "city", "type": "select", "label": "City", "props": { "dataSource": "cities" } },
                        { "id": "colors", "type": "checkbox", "label": "Colors", "props": { "options": ["red", "blue"] } },
                        { "id": "budget", "type": "slider-range", "label": "Budget", "props": { "min": 10, "max": 90 } },
                        {
                            "id": "kids",
                            "type": "array",
                            "label": "Kids",
                            "validation": { "minItems": 1 },
                            "arrayItems": [ { "id": "kidName", "type": "input", "label": "Name" } ]
                        }
                    ]
                }
            ]
        }
    }))
    .expect("definition")
}

#[test]
fn structural_errors_are_rejected() {
    assert!(matches!(load(json!({})), Err(DefinitionError::MissingApp)));
    assert!(matches!(load(json!({ "app": {} })), Err(DefinitionError::MissingPages)));
    assert!(matches!(load(json!({ "app": { "pages": [] } })), Err(DefinitionError::NoPages)));
    assert!(matches!(
        load(json!({ "app": { "pages": [ { "id": "a" }, { "id": "a" } ] } })),
        Err(DefinitionError::DuplicatePageId(id)) if id == "a"
    ));
    assert!(matches!(
        load(json!({ "app": { "pages": [ { "id": "a", "components": [
            { "id": "x", "type": "input" },
            { "id": "s", "type": "section", "children": [ { "id": "x", "type": "input" } ] }
        ] } ] } })),
        Err(DefinitionError::DuplicateComponentId { component, .. }) if component == "x"
    ));
    assert!(matches!(
        load(json!({ "app": { "pages": [ { "id": "a", "components": [ { "id": "x", "type": "hologram" } ] } ] } })),
        Err(DefinitionError::Json(_))
    ));
}

#[test]
fn lint_reports_unknown_references() {
    let form = load(json!({
        "app": {
            "pages": [
                {
                    "id": "a",
                    "branches": [ { "condition": { "field": "ghost", "operator": "equals", "value": 1 }, "nextPage": "b" } ],
                    "components": [
                        { "id": "pick", "type": "select", "props": { "dataSource": "nowhere" } }
                    ]
                }
            ]
        }
    }))
    .expect("definition");
    let warnings: Vec<String> = form.lint().iter().map(ToString::to_string).collect();
    assert_eq!(warnings.len(), 3, "{warnings:?}");
    assert!(warnings.iter().any(|warning| warning.contains("ghost")));
    assert!(warnings.iter().any(|warning| warning.contains("nowhere")));
}

#[test]
fn initial_values_are_type_appropriate() {
    let values = initial_values(&survey());
    assert_eq!(values.get("name"), Some(&json!("")));
    assert_eq!(values.get("age"), Some(&json!(30)));
    assert_eq!(values.get("intro"), None);
    assert_eq!(values.get("newsletter"), Some(&json!(false)));
    assert_eq!(values.get("colors"), Some(&json!([])));
    assert_eq!(values.get("budget"), Some(&json!({ "min": 10.0, "max": 90.0 })));
    assert_eq!(values.get("kids"), Some(&json!([ { "kidName": "" } ])));
}

#[test]
fn data_sources_resolve_statically_or_defer_to_the_host() {
    let session = FormSession::new(survey(), FormSettings::default());
    let sizes = session.options_for("size").expect("size options");
    assert_eq!(sizes.options().len(), 2);
    assert!(!sizes.needs_fetch());

    let cities = session.options_for("city").expect("city options");
    assert!(cities.needs_fetch());
    assert!(matches!(cities, ResolvedOptions::Remote { url, .. } if url == "https://example.com/cities"));
    assert!(session.options_for("name").is_none());
}

#[test]
fn summary_lists_visible_fields_in_logical_order() {
    let form = survey();
    let mut values = initial_values(&form);
    values.set("name", json!("Ann"));
    values.set("size", json!("l"));
    values.set("colors", json!(["red", "blue"]));

    let session = FormSession::new(form.clone(), FormSettings::default());
    let sections = confirmation_summary(&form, &values, session.translations(), None);
    let titles: Vec<&str> = sections.iter().map(|section| section.title.as_str()).collect();
    assert_eq!(titles, vec!["About you", "Preferences"]);

    let about = &sections[0].entries;
    assert_eq!(about[0].label, "Name");
    assert_eq!(about[0].value, "Ann");
    assert!(about.iter().any(|entry| entry.field_id == "newsletter" && entry.value == "No"));

    let prefs = &sections[1].entries;
    let size = prefs.iter().find(|entry| entry.field_id == "size").expect("size entry");
    assert_eq!(size.value, "Large");
    let city = prefs.iter().find(|entry| entry.field_id == "city").expect("city entry");
    assert_eq!(city.value, "-");
    let colors = prefs.iter().find(|entry| entry.field_id == "colors").expect("colors entry");
    assert_eq!(colors.value, "red, blue");
}

#[test]
fn language_switch_changes_titles_and_messages() {
    let settings = FormSettings::from_json_str(
        r#"{
            "translations": {
                "nl": {
                    "pages": { "about": { "title": "Over jou" } },
                    "validation": { "minItems": "{fieldLabel}: minstens {minItems}" },
                    "components": { "kids": { "label": "Kinderen" } }
                }
            }
        }"#,
    )
    .expect("settings");
    let mut session = FormSession::new(survey(), settings);
    session.drain_events();

    session.set_language(Some("nl"));
    let Some(event) = session.current_page_event() else {
        panic!("expected a current page");
    };
    assert_eq!(event.page_title, "Over jou");

    session.set_value("name", json!("Ann"));
    session.next();
    session.set_value("kids", json!([]));
    session.next();
    assert_eq!(session.visible_errors()["kids"], vec!["Kinderen: minstens 1".to_string()]);

    session.set_language(None);
    assert_eq!(session.errors()["kids"], vec!["Kids requires at least 1 items".to_string()]);
    assert!(session.drain_events().iter().all(|event| matches!(event, FormEvent::PageChanged(_))));
}

#[test]
fn submission_records_round_trip_through_cbor() {
    let mut session = FormSession::new(survey(), FormSettings::default());
    session.go_to_page("prefs");
    session.submit();
    let record = session.submissions()["survey"][0].clone();

    let bytes = record.to_cbor().expect("encode");
    let decoded = formflow_core::SubmissionRecord::from_cbor(&bytes).expect("decode");
    assert_eq!(decoded, record);

    let pretty = record.to_json_pretty().expect("json");
    assert!(pretty.contains("\"formId\": \"survey\""));
    assert!(pretty.contains("\"submittedAt\""));
}

#[test]
fn schema_describes_the_document_root() {
    let schema = serde_json::to_value(definition_schema()).expect("schema json");
    assert_eq!(schema["title"], json!("FormDocument"));
    assert!(schema["properties"]["app"].is_object());
}
