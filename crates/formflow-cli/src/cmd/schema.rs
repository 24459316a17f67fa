use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use formflow_core::definition_schema;

use super::i18n::trf;

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Write the schema to this file instead of stdout
    #[arg(long = "out", value_name = "schema.json")]
    pub out: Option<PathBuf>,
}

pub fn run(args: &SchemaArgs) -> Result<()> {
    let json = serde_json::to_string_pretty(&definition_schema()).context("serialize schema")?;
    match &args.out {
        Some(path) => {
            fs::write(path, format!("{json}\n"))
                .with_context(|| trf("cli.error.write", &[&path.display().to_string()]))?;
            println!("{}", trf("cli.schema.written", &[&path.display().to_string()]));
        }
        None => println!("{json}"),
    }
    Ok(())
}
