use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use formflow_core::{
    Action, FormEvent, FormSession, FormSettings, HandlerEvent, ManualClock, NavigationOutcome,
    PageChangeEvent, SessionState, SubmissionRecord, SubmitError, ValidationErrors,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::i18n::{tr_key, trf};
use super::{load_settings, read_text};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the form definition (form.json)
    #[arg(value_name = "FORM")]
    pub form: PathBuf,
    /// JSON array of steps to replay against the form
    #[arg(long = "script", value_name = "script.json")]
    pub script: Option<PathBuf>,
    /// Host settings file (.json or .toml)
    #[arg(long = "settings", value_name = "settings.json")]
    pub settings: Option<PathBuf>,
    /// Emit a JSON transcript instead of text
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
    /// Write the last submission as CBOR to this file
    #[arg(long = "cbor-out", value_name = "submission.cbor")]
    pub cbor_out: Option<PathBuf>,
}

/// One scripted interaction. Steps are externally tagged:
/// `{"set": {"field": "name", "value": "Ann"}}`, `{"blur": "name"}`,
/// `{"action": {"type": "next"}}`, `{"click": "submitButton"}`,
/// `{"language": "nl"}`, `{"advance": 300}`, `"restart"`, `"backFromThankYou"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptStep {
    Set { field: String, value: Value },
    Blur(String),
    Action(Action),
    Click(String),
    Language(Option<String>),
    /// Moves the session clock forward, releasing due debounced expressions.
    Advance(u64),
    Restart,
    BackFromThankYou,
}

impl ScriptStep {
    fn label(&self) -> String {
        match self {
            ScriptStep::Set { field, .. } => format!("set {field}"),
            ScriptStep::Blur(field) => format!("blur {field}"),
            ScriptStep::Action(action) => match action {
                Action::Next => "next".to_string(),
                Action::Previous => "previous".to_string(),
                Action::Submit => "submit".to_string(),
                Action::Reset => "reset".to_string(),
                Action::GoToPage { page_id } => format!("goToPage {page_id}"),
                Action::SetValue { field, .. } => format!("setValue {field}"),
            },
            ScriptStep::Click(component) => format!("click {component}"),
            ScriptStep::Language(Some(language)) => format!("language {language}"),
            ScriptStep::Language(None) => "language -".to_string(),
            ScriptStep::Advance(ms) => format!("advance {ms}ms"),
            ScriptStep::Restart => "restart".to_string(),
            ScriptStep::BackFromThankYou => "backFromThankYou".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<NavigationOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recomputed: Vec<String>,
    pub events: Vec<FormEvent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThankYouView {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    #[serde(flatten)]
    pub record: SubmissionRecord,
    /// Canonical CBOR encoding of the record, hex encoded.
    pub cbor: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub form_key: String,
    pub steps: Vec<StepReport>,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageChangeEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thank_you: Option<ThankYouView>,
    pub history: Vec<String>,
    pub values: Value,
    pub errors: ValidationErrors,
    pub submission_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<Vec<SubmissionView>>,
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw).with_context(|| trf("cli.error.script", &[&path.display().to_string()]))
}

fn apply(session: &mut FormSession, clock: &ManualClock, step: ScriptStep) -> NavigationOutcome {
    match step {
        ScriptStep::Set { field, value } => session.set_value(&field, value),
        ScriptStep::Blur(field) => session.blur(&field),
        ScriptStep::Action(action) => match action {
            Action::Next => session.next(),
            Action::Previous => session.previous(),
            Action::Submit => session.submit(),
            Action::Reset => session.reset(),
            Action::GoToPage { page_id } => session.go_to_page(&page_id),
            Action::SetValue { field, value } => session.set_value(&field, value),
        },
        ScriptStep::Click(component) => session.trigger(&component, HandlerEvent::Click),
        ScriptStep::Language(language) => {
            session.set_language(language.as_deref());
            NavigationOutcome::Updated
        }
        ScriptStep::Advance(ms) => {
            clock.advance(ms);
            NavigationOutcome::Unchanged
        }
        ScriptStep::Restart => session.restart(),
        ScriptStep::BackFromThankYou => session.back_from_thank_you(),
    }
}

/// Replays `steps` against a fresh session for `raw_form`.
pub fn replay(
    raw_form: &str,
    settings: FormSettings,
    steps: Vec<ScriptStep>,
) -> Result<(FormSession, Vec<StepReport>)> {
    let clock = ManualClock::new(0);
    let mut session = FormSession::from_json(raw_form, settings).with_clock(clock.clone());
    if let Some(message) = session.invalid_message() {
        bail!(trf("cli.run.invalid", &[message]));
    }
    session.set_submit_handler(|record: &SubmissionRecord| -> Result<(), SubmitError> {
        info!(id = %record.id, form = %record.form_id, "submission recorded");
        Ok(())
    });

    let mut reports = vec![StepReport {
        index: 0,
        step: "load".to_string(),
        outcome: None,
        recomputed: Vec::new(),
        events: session.drain_events(),
    }];
    for (position, step) in steps.into_iter().enumerate() {
        let label = step.label();
        debug!(step = %label, "replaying");
        let outcome = apply(&mut session, &clock, step);
        let recomputed = session.poll_expressions();
        reports.push(StepReport {
            index: position + 1,
            step: label,
            outcome: Some(outcome),
            recomputed,
            events: session.drain_events(),
        });
    }
    Ok((session, reports))
}

pub fn report(session: &FormSession, steps: Vec<StepReport>) -> Result<RunReport> {
    let form_key = session.form_key();
    let records = session.submissions().get(&form_key).map(Vec::as_slice).unwrap_or_default();
    let submissions = if session.settings().show_form_submissions {
        let views = records
            .iter()
            .map(|record| -> Result<SubmissionView> {
                Ok(SubmissionView {
                    record: record.clone(),
                    cbor: hex::encode(record.to_cbor()?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Some(views)
    } else {
        None
    };
    let history = session
        .history()
        .iter()
        .filter_map(|raw| session.definition()?.pages.get(raw.0))
        .map(|page| page.id.clone())
        .collect();
    Ok(RunReport {
        submission_count: records.len(),
        form_key,
        steps,
        state: session.state().clone(),
        page: session.current_page_event(),
        thank_you: session
            .is_thank_you_shown()
            .then(|| session.thank_you_text())
            .flatten()
            .map(|(title, message)| ThankYouView { title, message }),
        history,
        values: session.values().to_value(),
        errors: session.visible_errors(),
        submissions,
    })
}

pub fn run(args: &RunArgs) -> Result<RunReport> {
    let settings = load_settings(args.settings.as_deref())?;
    let raw = read_text(&args.form)?;
    let steps = match &args.script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };
    let (session, transcript) = replay(&raw, settings, steps)?;
    let report = report(&session, transcript)?;

    if let Some(path) = &args.cbor_out {
        let Some(last) = session.submissions().get(&report.form_key).and_then(|records| records.last()) else {
            bail!(tr_key("cli.run.no_submission"));
        };
        let bytes = last.to_cbor()?;
        fs::write(path, &bytes).with_context(|| trf("cli.error.write", &[&path.display().to_string()]))?;
        if !args.json {
            println!(
                "{}",
                trf("cli.run.cbor_written", &[&bytes.len().to_string(), &path.display().to_string()])
            );
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("serialize run transcript")?;
        println!("{json}");
    } else {
        print_text(&report);
    }
    Ok(report)
}

fn describe(outcome: &NavigationOutcome) -> String {
    match outcome {
        NavigationOutcome::Moved { from, to } => {
            trf("cli.run.outcome.moved", &[&from.to_string(), &to.to_string()])
        }
        NavigationOutcome::Blocked { fields } => trf("cli.run.outcome.blocked", &[&fields.join(", ")]),
        NavigationOutcome::Submitted { thank_you: true } => tr_key("cli.run.outcome.submitted_thank_you"),
        NavigationOutcome::Submitted { thank_you: false } => tr_key("cli.run.outcome.submitted"),
        NavigationOutcome::Reset => tr_key("cli.run.outcome.reset"),
        NavigationOutcome::Updated => tr_key("cli.run.outcome.updated"),
        NavigationOutcome::Unchanged => tr_key("cli.run.outcome.unchanged"),
        NavigationOutcome::Ignored => tr_key("cli.run.outcome.ignored"),
    }
}

fn describe_event(event: &FormEvent) -> String {
    match event {
        FormEvent::PageChanged(change) => trf(
            "cli.run.event.page_changed",
            &[
                &change.page_id,
                &(change.page_index + 1).to_string(),
                &change.total_pages.to_string(),
            ],
        ),
        FormEvent::Submitted(record) => trf("cli.run.event.submitted", &[&record.id]),
        other => other.name().to_string(),
    }
}

fn print_text(report: &RunReport) {
    for step in &report.steps {
        match &step.outcome {
            Some(outcome) => println!(
                "{}",
                trf("cli.run.step", &[&step.index.to_string(), &step.step, &describe(outcome)])
            ),
            None => println!("{}", trf("cli.run.step_plain", &[&step.index.to_string(), &step.step])),
        }
        if !step.recomputed.is_empty() {
            println!("    {}", trf("cli.run.recomputed", &[&step.recomputed.join(", ")]));
        }
        for event in &step.events {
            println!("    -> {}", describe_event(event));
        }
    }

    match (&report.state, &report.page, &report.thank_you) {
        (SessionState::ShowingThankYou { .. }, _, Some(thank_you)) => {
            println!("{}", trf("cli.run.final_thank_you", &[&thank_you.title]));
            println!("  {}", thank_you.message);
        }
        (_, Some(page), _) => println!(
            "{}",
            trf(
                "cli.run.final_page",
                &[&page.page_id, &(page.page_index + 1).to_string(), &page.total_pages.to_string()]
            )
        ),
        _ => {}
    }
    for (field, messages) in &report.errors {
        for message in messages {
            println!("  ! {field}: {message}");
        }
    }
    println!("{}", trf("cli.run.submissions", &[&report.submission_count.to_string()]));
}
