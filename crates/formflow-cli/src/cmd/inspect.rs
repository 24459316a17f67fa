use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use formflow_core::{FormDefinition, compute_logical_order};
use serde::Serialize;

use super::i18n::{tr_key, trf};
use super::load_definition;

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Path to the form definition (form.json)
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
    /// Emit a JSON report instead of text
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
    /// Treat lint warnings as errors
    #[arg(long = "strict", default_value_t = false)]
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub id: String,
    pub title: String,
    pub pages: Vec<PageReport>,
    pub has_thank_you_page: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub logical_index: usize,
    pub raw_index: usize,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
    pub is_end_page: bool,
    pub is_confirmation_page: bool,
    pub components: usize,
}

pub fn report(definition: &FormDefinition) -> InspectReport {
    let order = compute_logical_order(&definition.pages);
    let pages = order
        .entries()
        .iter()
        .filter_map(|entry| {
            let page = definition.pages.get(entry.raw_index.0)?;
            Some(PageReport {
                logical_index: entry.logical_index.0,
                raw_index: entry.raw_index.0,
                id: page.id.clone(),
                title: page.title.clone(),
                next_page: page.next_page.clone(),
                branches: page.branches.iter().map(|branch| branch.next_page.clone()).collect(),
                is_end_page: page.is_end_page,
                is_confirmation_page: page.is_confirmation_page,
                components: page.components.len(),
            })
        })
        .collect();
    InspectReport {
        id: definition.id.clone(),
        title: definition.title.clone(),
        pages,
        has_thank_you_page: definition.thank_you_page.is_some(),
        warnings: definition.lint().iter().map(ToString::to_string).collect(),
    }
}

pub fn run(args: &InspectArgs) -> Result<InspectReport> {
    let definition = load_definition(&args.form)?;
    let report = report(&definition);
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("serialize inspect report")?;
        println!("{json}");
    } else {
        print_text(&report);
    }
    Ok(report)
}

fn print_text(report: &InspectReport) {
    println!("{}", trf("cli.inspect.header", &[&report.id, &report.title]));
    for page in &report.pages {
        let mut flags = Vec::new();
        if page.is_end_page {
            flags.push(tr_key("cli.inspect.flag.end"));
        }
        if page.is_confirmation_page {
            flags.push(tr_key("cli.inspect.flag.confirmation"));
        }
        if !page.branches.is_empty() {
            flags.push(trf("cli.inspect.flag.branches", &[&page.branches.join(", ")]));
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join("; "))
        };
        println!(
            "  {}. {} (#{}) {}{}",
            page.logical_index + 1,
            page.id,
            page.raw_index,
            page.title,
            flags
        );
    }
    if report.has_thank_you_page {
        println!("{}", tr_key("cli.inspect.thank_you"));
    }
}

/// Writes lint findings to stderr.
pub fn emit_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{}", trf("cli.inspect.warning", &[warning]));
    }
}
