use std::ffi::OsString;

use anyhow::{Error, Result, bail};
use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{
    self, inspect::InspectArgs, render::RenderArgs, run::RunArgs, schema::SchemaArgs,
    validate::ValidateArgs,
};

/// Environment variable holding the tracing filter directives.
pub const LOG_ENV: &str = "FORMFLOW_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "formflow",
    about = "Inspect, validate and replay JSON-declared multi-step forms",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(long = "locale", value_name = "LOCALE", global = true)]
    locale: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the logical page order and lint findings of a form
    Inspect(InspectArgs),
    /// Validate field values against every page of a form
    Validate(ValidateArgs),
    /// Substitute field values into template text
    Render(RenderArgs),
    /// Print the JSON Schema of form definitions
    Schema(SchemaArgs),
    /// Replay a scripted session against a form
    #[command(
        long_about = "Replay a scripted session against a form. The script is a JSON array of \
steps such as {\"set\": {\"field\": \"name\", \"value\": \"Ann\"}} or {\"action\": {\"type\": \"next\"}}."
    )]
    Run(RunArgs),
}

pub fn main() -> Result<()> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    cmd::i18n::init(cmd::i18n::cli_locale_from_argv(&argv));
    init_tracing();

    let mut command = localize_help(Cli::command(), true);
    let matches = match command.try_get_matches_from_mut(argv) {
        Ok(matches) => matches,
        Err(err) => err.exit(),
    };
    let cli = Cli::from_arg_matches(&matches).map_err(|err| Error::msg(err.to_string()))?;
    cmd::i18n::init(cli.locale.clone());
    match cli.command {
        Commands::Inspect(args) => {
            let report = cmd::inspect::run(&args)?;
            cmd::inspect::emit_warnings(&report.warnings);
            if args.strict && !report.warnings.is_empty() {
                bail!(cmd::i18n::trf(
                    "cli.inspect.strict",
                    &[&report.warnings.len().to_string()]
                ));
            }
            Ok(())
        }
        Commands::Validate(args) => cmd::validate::run(&args),
        Commands::Render(args) => cmd::render::run(&args),
        Commands::Schema(args) => cmd::schema::run(&args),
        Commands::Run(args) => cmd::run::run(&args).map(|_| ()),
    }
}

/// Logs go to stderr so that stdout stays parseable with `--json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn localize_help(mut command: clap::Command, is_root: bool) -> clap::Command {
    if let Some(about) = command.get_about().map(|s| s.to_string()) {
        command = command.about(cmd::i18n::tr_lit(&about));
    }
    if let Some(long_about) = command.get_long_about().map(|s| s.to_string()) {
        command = command.long_about(cmd::i18n::tr_lit(&long_about));
    }

    command = command
        .disable_help_subcommand(true)
        .disable_help_flag(true)
        .arg(
            Arg::new("help")
                .short('h')
                .long("help")
                .action(ArgAction::Help)
                .help(cmd::i18n::tr_lit("Print help")),
        );
    if is_root {
        command = command.disable_version_flag(true).arg(
            Arg::new("version")
                .short('V')
                .long("version")
                .action(ArgAction::Version)
                .help(cmd::i18n::tr_lit("Print version")),
        );
    }

    let arg_ids = command
        .get_arguments()
        .map(|arg| arg.get_id().clone())
        .collect::<Vec<_>>();
    for arg_id in arg_ids {
        command = command.mut_arg(arg_id, |arg| {
            let mut arg = arg;
            if let Some(help) = arg.get_help().map(ToString::to_string) {
                arg = arg.help(cmd::i18n::tr_lit(&help));
            }
            arg
        });
    }

    let sub_names = command
        .get_subcommands()
        .map(|sub| sub.get_name().to_string())
        .collect::<Vec<_>>();
    for name in sub_names {
        command = command.mut_subcommand(name, |sub| localize_help(sub, false));
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inspect_with_global_locale() {
        let cli = Cli::try_parse_from(["formflow", "--locale", "nl", "inspect", "form.json", "--json"])
            .expect("expected CLI to parse");
        assert_eq!(cli.locale.as_deref(), Some("nl"));
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.form, std::path::PathBuf::from("form.json"));
                assert!(args.json);
                assert!(!args.strict);
            }
            _ => panic!("expected inspect args"),
        }
    }

    #[test]
    fn parses_validate_command() {
        let cli = Cli::try_parse_from([
            "formflow",
            "validate",
            "form.json",
            "--values",
            "values.json",
            "--page",
            "contact",
            "--locale",
            "en",
        ])
        .expect("expected CLI to parse");
        assert_eq!(cli.locale.as_deref(), Some("en"));
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.values.as_deref(), Some(std::path::Path::new("values.json")));
                assert_eq!(args.page.as_deref(), Some("contact"));
                assert!(args.settings.is_none());
            }
            _ => panic!("expected validate args"),
        }
    }

    #[test]
    fn render_needs_text_or_form() {
        assert!(Cli::try_parse_from(["formflow", "render"]).is_err());
        assert!(
            Cli::try_parse_from(["formflow", "render", "--text", "x", "--form", "form.json"]).is_err()
        );
        let cli = Cli::try_parse_from(["formflow", "render", "--text", "Hi {{name}}", "--strict"])
            .expect("expected CLI to parse");
        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.text.as_deref(), Some("Hi {{name}}"));
                assert!(args.strict);
            }
            _ => panic!("expected render args"),
        }
    }

    #[test]
    fn parses_run_command() {
        let cli = Cli::try_parse_from([
            "formflow",
            "run",
            "form.json",
            "--script",
            "steps.json",
            "--settings",
            "settings.toml",
            "--cbor-out",
            "/tmp/out.cbor",
        ])
        .expect("expected CLI to parse");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.script.as_deref(), Some(std::path::Path::new("steps.json")));
                assert_eq!(args.settings.as_deref(), Some(std::path::Path::new("settings.toml")));
                assert_eq!(args.cbor_out.as_deref(), Some(std::path::Path::new("/tmp/out.cbor")));
                assert!(!args.json);
            }
            _ => panic!("expected run args"),
        }
    }
}
