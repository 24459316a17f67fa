pub mod i18n;
pub mod inspect;
pub mod render;
pub mod run;
pub mod schema;
pub mod validate;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use formflow_core::{FormDefinition, FormSettings, FormValues, SettingsFormat};
use serde_json::Value;

use self::i18n::trf;

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| trf("cli.error.read", &[&path.display().to_string()]))
}

pub(crate) fn load_definition(path: &Path) -> Result<FormDefinition> {
    let raw = read_text(path)?;
    FormDefinition::from_json(&raw)
        .with_context(|| trf("cli.error.definition", &[&path.display().to_string()]))
}

/// Reads a JSON object of field values. A missing path yields an empty map.
pub(crate) fn load_values(path: Option<&Path>) -> Result<FormValues> {
    let Some(path) = path else {
        return Ok(FormValues::new());
    };
    let raw = read_text(path)?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| trf("cli.error.values", &[&path.display().to_string()]))?;
    if !value.is_object() {
        bail!(trf("cli.error.values_object", &[&path.display().to_string()]));
    }
    Ok(FormValues::from_value(value))
}

/// Loads host settings (`.json` or `.toml`). The form language falls back to
/// the CLI locale when the settings do not pin one.
pub(crate) fn load_settings(path: Option<&Path>) -> Result<FormSettings> {
    let mut settings = match path {
        Some(path) => {
            let format = SettingsFormat::from_path(path)?;
            let raw = read_text(path)?;
            FormSettings::parse(&raw, format)
                .with_context(|| trf("cli.error.settings", &[&path.display().to_string()]))?
        }
        None => FormSettings::default(),
    };
    if settings.current_language.is_none() {
        settings.current_language = Some(i18n::selected_locale().to_string());
    }
    Ok(settings)
}
