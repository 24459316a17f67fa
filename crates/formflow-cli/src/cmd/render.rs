use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use formflow_core::messages::UiText;
use formflow_core::{MessageResolver, ResolutionMode, TemplateVariableResolver};

use super::i18n::tr_key;
use super::{load_definition, load_settings, load_values};

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// JSON object with the field values to substitute
    #[arg(long = "values", value_name = "values.json")]
    pub values: Option<PathBuf>,
    /// Template text containing {{field}} placeholders
    #[arg(long = "text", value_name = "TEXT", required_unless_present = "form")]
    pub text: Option<String>,
    /// Render the thank-you page of this form definition instead of --text
    #[arg(long = "form", value_name = "FORM", conflicts_with = "text")]
    pub form: Option<PathBuf>,
    /// Host settings file (.json or .toml) used for translated thank-you texts
    #[arg(long = "settings", value_name = "settings.json", requires = "form")]
    pub settings: Option<PathBuf>,
    /// Fail on placeholders without a value instead of printing "-"
    #[arg(long = "strict", default_value_t = false)]
    pub strict: bool,
}

pub fn run(args: &RenderArgs) -> Result<()> {
    let values = load_values(args.values.as_deref())?;
    let resolver = TemplateVariableResolver::new(if args.strict {
        ResolutionMode::Strict
    } else {
        ResolutionMode::Lenient
    });

    for text in texts(args)? {
        println!("{}", resolver.try_resolve(&text, &values)?);
    }
    Ok(())
}

fn texts(args: &RenderArgs) -> Result<Vec<String>> {
    if let Some(text) = &args.text {
        return Ok(vec![text.clone()]);
    }
    let Some(form) = &args.form else {
        bail!(tr_key("cli.render.missing_text"));
    };
    let definition = load_definition(form)?;
    let Some(page) = &definition.thank_you_page else {
        bail!(tr_key("cli.render.no_thank_you"));
    };
    let settings = load_settings(args.settings.as_deref())?;
    let translations = settings.translation_service();
    let messages = MessageResolver::new(&translations, &settings.custom_texts);
    let title = match &page.title {
        Some(title) => translations.translate("thankYouPage.title", title),
        None => messages.ui_text(UiText::ThankYouTitle, &[]),
    };
    let message = match &page.message {
        Some(message) => translations.translate("thankYouPage.message", message),
        None => messages.ui_text(UiText::ThankYouMessage, &[]),
    };
    Ok(vec![title, message])
}
