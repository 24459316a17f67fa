use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use unic_langid::LanguageIdentifier;

const SUPPORTED_LOCALES: &[&str] = &["en", "nl"];

static EN_MESSAGES: Lazy<BTreeMap<String, String>> =
    Lazy::new(|| parse_catalog(include_str!("../../i18n/en.json")));
static NL_MESSAGES: Lazy<BTreeMap<String, String>> =
    Lazy::new(|| parse_catalog(include_str!("../../i18n/nl.json")));
static EN_VALUE_TO_KEY: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    EN_MESSAGES
        .iter()
        .map(|(k, v)| (v.clone(), k.clone()))
        .collect()
});

static SELECTED_LOCALE: OnceLock<String> = OnceLock::new();
static LOCALE_MESSAGES: OnceLock<BTreeMap<String, String>> = OnceLock::new();

fn parse_catalog(raw: &str) -> BTreeMap<String, String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn detect_env_locale() -> Option<String> {
    for key in ["LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Ok(val) = env::var(key) {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn detect_system_locale() -> Option<String> {
    sys_locale::get_locale()
}

fn normalize_locale(raw: &str) -> Option<String> {
    let mut cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Some((head, _)) = cleaned.split_once('.') {
        cleaned = head;
    }
    if let Some((head, _)) = cleaned.split_once('@') {
        cleaned = head;
    }
    let cleaned = cleaned.replace('_', "-");
    cleaned
        .parse::<LanguageIdentifier>()
        .ok()
        .map(|lid| lid.to_string())
}

fn resolve_supported_locale(candidate: &str) -> Option<String> {
    let norm = normalize_locale(candidate)?;
    if SUPPORTED_LOCALES.contains(&norm.as_str()) {
        return Some(norm);
    }
    let base = norm
        .split('-')
        .next()
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| "en".to_string());
    if SUPPORTED_LOCALES.contains(&base.as_str()) {
        return Some(base);
    }
    None
}

fn select_locale(cli_locale: Option<String>) -> String {
    if let Some(cli) = cli_locale.as_deref()
        && let Some(found) = resolve_supported_locale(cli)
    {
        return found;
    }
    if let Some(env_loc) = detect_env_locale()
        && let Some(found) = resolve_supported_locale(&env_loc)
    {
        return found;
    }
    if let Some(sys_loc) = detect_system_locale()
        && let Some(found) = resolve_supported_locale(&sys_loc)
    {
        return found;
    }
    "en".to_string()
}

/// Catalog for `locale` layered over the English one.
pub fn resolved_catalog(locale: &str) -> BTreeMap<String, String> {
    let mut merged = EN_MESSAGES.clone();
    if locale == "nl" {
        merged.extend(NL_MESSAGES.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Selects the CLI locale once per process. Later calls are no-ops.
pub fn init(cli_locale: Option<String>) {
    let locale = select_locale(cli_locale);
    let _ = SELECTED_LOCALE.set(locale.clone());
    let _ = LOCALE_MESSAGES.set(resolved_catalog(&locale));
}

pub fn cli_locale_from_argv(args: &[OsString]) -> Option<String> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let raw = arg.to_string_lossy();
        if raw == "--locale" {
            if let Some(value) = iter.next() {
                return Some(value.to_string_lossy().to_string());
            }
            return None;
        }
        if let Some(rest) = raw.strip_prefix("--locale=") {
            return Some(rest.to_string());
        }
    }
    None
}

pub fn selected_locale() -> &'static str {
    SELECTED_LOCALE.get().map(String::as_str).unwrap_or("en")
}

pub fn tr_key(key: &str) -> String {
    LOCALE_MESSAGES
        .get()
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| EN_MESSAGES.get(key).cloned())
        .unwrap_or_else(|| key.to_string())
}

pub fn tr_lit(english_literal: &str) -> String {
    let Some(key) = EN_VALUE_TO_KEY.get(english_literal) else {
        return english_literal.to_string();
    };
    tr_key(key)
}

/// `tr_key` with positional `{}` substitution.
pub fn trf(key: &str, args: &[&str]) -> String {
    let mut msg = tr_key(key);
    for arg in args {
        msg = msg.replacen("{}", arg, 1);
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_share_keys() {
        let en: Vec<&String> = EN_MESSAGES.keys().collect();
        let nl: Vec<&String> = NL_MESSAGES.keys().collect();
        assert!(!en.is_empty());
        assert_eq!(en, nl, "nl.json must translate every key of en.json");
    }

    #[test]
    fn placeholders_survive_translation() {
        for (key, english) in EN_MESSAGES.iter() {
            let dutch = &NL_MESSAGES[key];
            assert_eq!(
                english.matches("{}").count(),
                dutch.matches("{}").count(),
                "placeholder count differs for {key}"
            );
        }
    }

    #[test]
    fn normalizes_posix_locales() {
        assert_eq!(resolve_supported_locale("nl_BE.UTF-8").as_deref(), Some("nl"));
        assert_eq!(resolve_supported_locale("en_US@euro").as_deref(), Some("en"));
        assert_eq!(resolve_supported_locale("fr"), None);
        assert_eq!(resolve_supported_locale("  "), None);
    }

    #[test]
    fn reads_locale_from_argv() {
        let argv: Vec<OsString> = ["formflow", "inspect", "--locale=nl", "form.json"]
            .into_iter()
            .map(OsString::from)
            .collect();
        assert_eq!(cli_locale_from_argv(&argv).as_deref(), Some("nl"));

        let argv: Vec<OsString> = ["formflow", "--locale"].into_iter().map(OsString::from).collect();
        assert_eq!(cli_locale_from_argv(&argv), None);
    }

    #[test]
    fn dutch_catalog_falls_back_to_english_keys() {
        let catalog = resolved_catalog("nl");
        assert_eq!(catalog.len(), EN_MESSAGES.len());
        assert_ne!(catalog["cli.validate.ok"], EN_MESSAGES["cli.validate.ok"]);
    }
}
