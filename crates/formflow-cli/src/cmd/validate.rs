use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use formflow_core::values::initial_values;
use formflow_core::{
    ExpressionEngine, FormDefinition, FormSettings, FormValues, MessageResolver, ValidationErrors,
    Validator, compute_logical_order,
};
use serde::Serialize;

use super::i18n::{tr_key, trf};
use super::{load_definition, load_settings, load_values};

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the form definition (form.json)
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
    /// JSON object with the field values to check
    #[arg(long = "values", value_name = "values.json")]
    pub values: Option<PathBuf>,
    /// Only validate the page with this id
    #[arg(long = "page", value_name = "PAGE_ID")]
    pub page: Option<String>,
    /// Host settings file (.json or .toml)
    #[arg(long = "settings", value_name = "settings.json")]
    pub settings: Option<PathBuf>,
    /// Emit a JSON report instead of text
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageValidation {
    pub page_id: String,
    pub errors: ValidationErrors,
}

/// Validates `provided` values (layered over the definition defaults) page by
/// page in logical order.
pub fn validate_definition(
    definition: &FormDefinition,
    settings: &FormSettings,
    provided: &FormValues,
    only_page: Option<&str>,
) -> Result<Vec<PageValidation>> {
    if let Some(page_id) = only_page
        && definition.page(page_id).is_none()
    {
        bail!(trf("cli.validate.unknown_page", &[page_id]));
    }

    let mut values = initial_values(definition);
    for (key, value) in provided.as_map() {
        values.insert(key.clone(), value.clone());
    }
    let mut engine = ExpressionEngine::new(definition);
    let overrides = engine.evaluate(&mut values, &ValidationErrors::new());

    let translations = settings.translation_service();
    let validator = Validator::new(MessageResolver::new(&translations, &settings.custom_texts))
        .with_overrides(&overrides);

    let order = compute_logical_order(&definition.pages);
    let results = order
        .entries()
        .iter()
        .filter(|entry| only_page.is_none_or(|id| id == entry.page_id))
        .filter_map(|entry| definition.pages.get(entry.raw_index.0))
        .map(|page| PageValidation {
            page_id: page.id.clone(),
            errors: validator.validate_page(page, &values),
        })
        .collect();
    Ok(results)
}

pub fn run(args: &ValidateArgs) -> Result<()> {
    let definition = load_definition(&args.form)?;
    let settings = load_settings(args.settings.as_deref())?;
    let values = load_values(args.values.as_deref())?;
    let results = validate_definition(&definition, &settings, &values, args.page.as_deref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&results).context("serialize validation report")?;
        println!("{json}");
    } else {
        for result in &results {
            for (field, messages) in &result.errors {
                for message in messages {
                    println!("{}", trf("cli.validate.error", &[&result.page_id, field, message]));
                }
            }
        }
    }

    let failed: usize = results.iter().map(|result| result.errors.len()).sum();
    if failed > 0 {
        bail!(trf("cli.validate.failed", &[&failed.to_string()]));
    }
    if !args.json {
        println!("{}", tr_key("cli.validate.ok"));
    }
    Ok(())
}
