use std::collections::BTreeMap;
use std::path::Path;

fn read_catalog(locale: &str) -> BTreeMap<String, String> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("i18n")
        .join(format!("{locale}.json"));
    let raw = std::fs::read_to_string(&path).expect("read catalog");
    serde_json::from_str(&raw).expect("parse catalog")
}

#[test]
fn command_keys_exist_in_en_catalog() {
    let catalog = read_catalog("en");
    let required = [
        "cli.error.definition",
        "cli.error.read",
        "cli.error.script",
        "cli.error.settings",
        "cli.error.values",
        "cli.inspect.header",
        "cli.inspect.strict",
        "cli.render.no_thank_you",
        "cli.run.invalid",
        "cli.run.no_submission",
        "cli.run.step",
        "cli.schema.written",
        "cli.validate.failed",
        "cli.validate.ok",
        "cli.help.print_help",
        "cli.help.print_version",
    ];

    for key in required {
        assert!(catalog.contains_key(key), "missing i18n key {key}");
    }
}

#[test]
fn every_locale_covers_the_english_catalog() {
    let en = read_catalog("en");
    let nl = read_catalog("nl");
    let missing: Vec<&String> = en.keys().filter(|key| !nl.contains_key(*key)).collect();
    assert!(missing.is_empty(), "nl.json is missing {missing:?}");
    assert!(
        nl.values().all(|text| !text.trim().is_empty()),
        "nl.json contains empty translations"
    );
}
