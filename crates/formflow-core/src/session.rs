//! Page-flow state machine driving one rendering session.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::computed::{ExpressionEngine, ExpressionOverrides};
use crate::debounce::{Clock, DebounceScheduler};
use crate::events::{FormEvent, PageChangeEvent};
use crate::expr::ExpressionError;
use crate::i18n::TranslationService;
use crate::messages::{MessageResolver, UiText};
use crate::options::{ResolvedOptions, options_for};
use crate::page_order::{LogicalIndex, LogicalPageOrder, RawIndex, compute_logical_order};
use crate::settings::FormSettings;
use crate::spec::action::{Action, HandlerEvent};
use crate::spec::component::{Component, find_component};
use crate::spec::form::{DefinitionError, DefinitionWarning, FormDefinition, Page};
use crate::submission::SubmissionRecord;
use crate::summary::{SummarySection, confirmation_summary};
use crate::template::resolve;
use crate::validate::{ValidationErrors, Validator};
use crate::values::{FormValues, initial_values};
use crate::visibility::{VisibilityMap, is_visible, resolve_visibility};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("submission could not be delivered: {0}")]
    Delivery(String),
}

/// Receives the final values of every successful submit.
pub trait SubmitHandler {
    fn submit(&mut self, record: &SubmissionRecord) -> Result<(), SubmitError>;
}

impl<F> SubmitHandler for F
where
    F: FnMut(&SubmissionRecord) -> Result<(), SubmitError>,
{
    fn submit(&mut self, record: &SubmissionRecord) -> Result<(), SubmitError> {
        self(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    OnPage { page: RawIndex },
    ShowingThankYou { last_page: RawIndex },
    /// The definition could not be used; every operation is a no-op.
    Invalid { message: String },
}

/// Result of a navigation or input operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum NavigationOutcome {
    Moved { from: RawIndex, to: RawIndex },
    /// Validation failed; the session stayed on the page.
    Blocked { fields: Vec<String> },
    Submitted { thank_you: bool },
    Reset,
    Updated,
    Unchanged,
    /// Not applicable in the current state or settings.
    Ignored,
}

pub struct FormSession {
    definition: Option<FormDefinition>,
    state: SessionState,
    order: LogicalPageOrder,
    warnings: Vec<DefinitionWarning>,
    settings: FormSettings,
    translations: TranslationService,
    values: FormValues,
    errors: ValidationErrors,
    history: Vec<RawIndex>,
    touched: BTreeSet<String>,
    blurred: BTreeSet<String>,
    submitted: bool,
    submissions: BTreeMap<String, Vec<SubmissionRecord>>,
    expressions: ExpressionEngine,
    overrides: ExpressionOverrides,
    scheduler: DebounceScheduler,
    events: VecDeque<FormEvent>,
    submit_handler: Option<Box<dyn SubmitHandler>>,
}

impl fmt::Debug for FormSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSession")
            .field("state", &self.state)
            .field("history", &self.history)
            .field("submitted", &self.submitted)
            .field("values", &self.values)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl FormSession {
    pub fn new(definition: FormDefinition, settings: FormSettings) -> Self {
        let mut session = Self::empty(settings);
        session.load_definition(definition);
        session
    }

    /// Parses and loads a definition. Structural problems produce a session in
    /// the [`SessionState::Invalid`] state instead of an error.
    pub fn from_json(raw: &str, settings: FormSettings) -> Self {
        let mut session = Self::empty(settings);
        session.load_json(raw);
        session
    }

    fn empty(settings: FormSettings) -> Self {
        let translations = settings.translation_service();
        Self {
            definition: None,
            state: SessionState::Invalid {
                message: String::new(),
            },
            order: LogicalPageOrder::default(),
            warnings: Vec::new(),
            settings,
            translations,
            values: FormValues::new(),
            errors: ValidationErrors::new(),
            history: Vec::new(),
            touched: BTreeSet::new(),
            blurred: BTreeSet::new(),
            submitted: false,
            submissions: BTreeMap::new(),
            expressions: ExpressionEngine::default(),
            overrides: ExpressionOverrides::default(),
            scheduler: DebounceScheduler::default(),
            events: VecDeque::new(),
            submit_handler: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.scheduler = DebounceScheduler::new(clock);
        self
    }

    pub fn with_submit_handler(mut self, handler: impl SubmitHandler + 'static) -> Self {
        self.submit_handler = Some(Box::new(handler));
        self
    }

    pub fn set_submit_handler(&mut self, handler: impl SubmitHandler + 'static) {
        self.submit_handler = Some(Box::new(handler));
    }

    pub fn load_json(&mut self, raw: &str) {
        match FormDefinition::from_json(raw) {
            Ok(definition) => self.load_definition(definition),
            Err(err) => self.invalidate(&err),
        }
    }

    /// Replaces the definition and resets every piece of session state.
    /// Pending debounced evaluations and undelivered events are discarded.
    pub fn load_definition(&mut self, definition: FormDefinition) {
        self.scheduler.cancel_all();
        self.events.clear();
        self.warnings = definition.lint();
        for warning in &self.warnings {
            warn!(form = %definition.id, "{warning}");
        }
        self.order = compute_logical_order(&definition.pages);
        self.expressions = ExpressionEngine::new(&definition);
        self.definition = Some(definition);
        self.overrides = ExpressionOverrides::default();
        self.start_over();
    }

    fn invalidate(&mut self, err: &DefinitionError) {
        warn!(%err, "form definition rejected");
        self.scheduler.cancel_all();
        self.events.clear();
        self.definition = None;
        self.order = LogicalPageOrder::default();
        self.expressions = ExpressionEngine::default();
        self.overrides = ExpressionOverrides::default();
        self.values = FormValues::new();
        self.errors.clear();
        self.history.clear();
        self.touched.clear();
        self.blurred.clear();
        self.submitted = false;
        let text = if err.is_empty_form() {
            UiText::NoPages
        } else {
            UiText::InvalidForm
        };
        let message = self.messages().ui_text(text, &[]);
        self.state = SessionState::Invalid { message };
    }

    /// Full reset to the first logical page with fresh default values.
    fn start_over(&mut self) {
        let Some(definition) = &self.definition else {
            return;
        };
        let first = self.order.first_raw().unwrap_or(RawIndex(0));
        self.values = initial_values(definition);
        self.errors.clear();
        self.touched.clear();
        self.blurred.clear();
        self.submitted = false;
        self.history = vec![first];
        self.state = SessionState::OnPage { page: first };
        self.expressions.reset();
        self.scheduler.cancel_all();
        self.refresh();
        self.emit_page_change(first, None);
    }

    // -- accessors -------------------------------------------------------

    pub fn definition(&self) -> Option<&FormDefinition> {
        self.definition.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.state, SessionState::Invalid { .. })
    }

    pub fn invalid_message(&self) -> Option<&str> {
        match &self.state {
            SessionState::Invalid { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_thank_you_shown(&self) -> bool {
        matches!(self.state, SessionState::ShowingThankYou { .. })
    }

    pub fn order(&self) -> &LogicalPageOrder {
        &self.order
    }

    pub fn warnings(&self) -> &[DefinitionWarning] {
        &self.warnings
    }

    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    pub fn translations(&self) -> &TranslationService {
        &self.translations
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    /// Every error of the current page, whether or not it is shown yet.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn history(&self) -> &[RawIndex] {
        &self.history
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn touched(&self) -> &BTreeSet<String> {
        &self.touched
    }

    pub fn blurred(&self) -> &BTreeSet<String> {
        &self.blurred
    }

    pub fn overrides(&self) -> &ExpressionOverrides {
        &self.overrides
    }

    pub fn expression_errors(&self) -> BTreeMap<String, ExpressionError> {
        self.overrides
            .errors()
            .map(|(id, err)| (id.to_string(), err.clone()))
            .collect()
    }

    pub fn submissions(&self) -> &BTreeMap<String, Vec<SubmissionRecord>> {
        &self.submissions
    }

    /// Key submissions are stored under: `prefixId` when set, else the form id.
    pub fn form_key(&self) -> String {
        match (&self.settings.prefix_id, &self.definition) {
            (Some(prefix), _) if !prefix.is_empty() => prefix.clone(),
            (_, Some(definition)) => definition.id.clone(),
            _ => "form".to_string(),
        }
    }

    pub fn current_raw(&self) -> Option<RawIndex> {
        match self.state {
            SessionState::OnPage { page } => Some(page),
            _ => None,
        }
    }

    pub fn current_logical(&self) -> Option<LogicalIndex> {
        self.current_raw().and_then(|raw| self.order.to_logical(raw))
    }

    pub fn current_page(&self) -> Option<&Page> {
        let raw = self.current_raw()?;
        self.definition.as_ref()?.pages.get(raw.0)
    }

    pub fn pending_debounces(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn drain_events(&mut self) -> Vec<FormEvent> {
        self.events.drain(..).collect()
    }

    pub fn messages(&self) -> MessageResolver<'_> {
        MessageResolver::new(&self.translations, &self.settings.custom_texts)
    }

    pub fn field_dom_id(&self, field_path: &str) -> String {
        self.settings.field_dom_id(field_path)
    }

    /// Errors the user should see: all of them after a submit attempt,
    /// otherwise only those of blurred fields.
    pub fn visible_errors(&self) -> ValidationErrors {
        if self.submitted {
            return self.errors.clone();
        }
        self.errors
            .iter()
            .filter(|(path, _)| self.blurred.contains(*path) || self.blurred.contains(root_of(path)))
            .map(|(path, messages)| (path.clone(), messages.clone()))
            .collect()
    }

    /// Visibility of every component on the current page.
    pub fn visibility(&self) -> VisibilityMap {
        match self.current_page() {
            Some(page) => resolve_visibility(&page.components, &self.values, Some(&self.overrides)),
            None => VisibilityMap::new(),
        }
    }

    pub fn is_field_disabled(&self, field: &str) -> bool {
        self.settings.disabled || self.overrides.disabled(root_of(field)) == Some(true)
    }

    pub fn options_for(&self, component_id: &str) -> Option<ResolvedOptions<'_>> {
        let definition = self.definition.as_ref()?;
        let component = definition
            .pages
            .iter()
            .find_map(|page| find_component(&page.components, component_id))?;
        Some(options_for(definition, component.kind.choices()?))
    }

    pub fn resolve_text(&self, text: &str) -> String {
        resolve(text, &self.values)
    }

    pub fn summary(&self) -> Vec<SummarySection> {
        match &self.definition {
            Some(definition) => {
                confirmation_summary(definition, &self.values, &self.translations, Some(&self.overrides))
            }
            None => Vec::new(),
        }
    }

    /// Title and message of the thank-you page with templates resolved.
    pub fn thank_you_text(&self) -> Option<(String, String)> {
        let page = self.definition.as_ref()?.thank_you_page.as_ref()?;
        let messages = self.messages();
        let title = match &page.title {
            Some(title) => self.translations.translate("thankYouPage.title", title),
            None => messages.ui_text(UiText::ThankYouTitle, &[]),
        };
        let message = match &page.message {
            Some(message) => self.translations.translate("thankYouPage.message", message),
            None => messages.ui_text(UiText::ThankYouMessage, &[]),
        };
        Some((self.resolve_text(&title), self.resolve_text(&message)))
    }

    /// Page-change payload for the page currently shown.
    pub fn current_page_event(&self) -> Option<PageChangeEvent> {
        self.page_event(self.current_raw()?, None)
    }

    // -- input -----------------------------------------------------------

    /// Applies a user change and fires the component's `onChange` action.
    pub fn set_value(&mut self, field: &str, value: Value) -> NavigationOutcome {
        if !self.apply_value(field, value) {
            return NavigationOutcome::Ignored;
        }
        let action = self
            .current_component(root_of(field))
            .and_then(|component| component.event_handlers.action_for(HandlerEvent::Change))
            .cloned();
        match action {
            Some(action) => self.run_action(action),
            None => NavigationOutcome::Updated,
        }
    }

    fn apply_value(&mut self, field: &str, value: Value) -> bool {
        if self.is_invalid() || self.is_field_disabled(field) {
            return false;
        }
        self.values.set(field, value);
        self.touched.insert(field.to_string());

        let dependents: Vec<(String, u64)> = self
            .expressions
            .dependents_of(root_of(field))
            .into_iter()
            .filter_map(|id| {
                let delay = self.expressions.config(id)?.debounce_ms?;
                Some((id.to_string(), delay))
            })
            .collect();
        for (id, delay) in dependents {
            self.scheduler.schedule(id.clone(), delay);
            self.expressions.defer(&id);
        }
        self.refresh();
        true
    }

    /// Marks a field as visited so its errors become visible.
    pub fn blur(&mut self, field: &str) -> NavigationOutcome {
        if self.is_invalid() {
            return NavigationOutcome::Ignored;
        }
        self.blurred.insert(field.to_string());
        self.revalidate();
        NavigationOutcome::Updated
    }

    /// Runs debounced evaluations whose delay has elapsed and returns their ids.
    pub fn poll_expressions(&mut self) -> Vec<String> {
        let due = self.scheduler.take_due();
        if due.is_empty() {
            return due;
        }
        for id in &due {
            self.expressions.release(id);
        }
        self.refresh();
        due
    }

    pub fn set_language(&mut self, language: Option<&str>) {
        self.translations.set_language(language);
        self.settings.current_language = language.map(str::to_string);
        self.revalidate();
    }

    // -- navigation ------------------------------------------------------

    pub fn next(&mut self) -> NavigationOutcome {
        let Some(current) = self.navigable_page() else {
            return NavigationOutcome::Ignored;
        };
        self.submitted = true;
        self.refresh();
        if !self.errors.is_empty() {
            debug!(page = %current, fields = self.errors.len(), "next blocked by validation");
            return self.blocked();
        }

        let Some(page) = self.page_at(current) else {
            return NavigationOutcome::Ignored;
        };
        if page.is_end_page || page.is_confirmation_page {
            return self.submit();
        }
        match self.resolve_next(page, current) {
            Some(target) => {
                self.history.push(target);
                self.move_to(current, target)
            }
            None => self.submit(),
        }
    }

    /// Branch target, else `nextPage`, else the following page in logical
    /// order. A target that names no page falls through to the next rule.
    fn resolve_next(&self, page: &Page, current: RawIndex) -> Option<RawIndex> {
        let definition = self.definition.as_ref()?;
        if let Some(branch) = page
            .branches
            .iter()
            .find(|branch| is_visible(&branch.conditions(), &self.values))
        {
            match definition.page_position(&branch.next_page) {
                Some(position) => return Some(RawIndex(position)),
                None => warn!(page = %page.id, target = %branch.next_page, "branch target not found"),
            }
        }
        if let Some(next) = &page.next_page {
            match definition.page_position(next) {
                Some(position) => return Some(RawIndex(position)),
                None => warn!(page = %page.id, target = %next, "nextPage target not found"),
            }
        }
        self.order.next_raw(current)
    }

    /// Steps back along the path actually taken, or one logical page back
    /// when there is no history to follow.
    pub fn previous(&mut self) -> NavigationOutcome {
        let Some(current) = self.navigable_page() else {
            return NavigationOutcome::Ignored;
        };
        let target = if self.history.len() > 1 {
            self.history.pop();
            self.history.last().copied()
        } else {
            let target = self.order.previous_raw(current);
            if let Some(target) = target {
                self.history = vec![target];
            }
            target
        };
        match target {
            Some(target) => self.move_to(current, target),
            None => NavigationOutcome::Unchanged,
        }
    }

    pub fn submit(&mut self) -> NavigationOutcome {
        let Some(current) = self.navigable_page() else {
            return NavigationOutcome::Ignored;
        };
        self.submitted = true;
        self.refresh();
        if !self.errors.is_empty() {
            return self.blocked();
        }

        let key = self.form_key();
        let record = SubmissionRecord::new(key.clone(), &self.values);
        debug!(form = %key, id = %record.id, "form submitted");
        if let Some(handler) = self.submit_handler.as_mut()
            && let Err(err) = handler.submit(&record)
        {
            warn!(form = %key, %err, "submit handler failed");
        }
        self.submissions.entry(key).or_default().push(record.clone());
        self.events.push_back(FormEvent::Submitted(record));

        let has_thank_you = self
            .definition
            .as_ref()
            .is_some_and(|definition| definition.thank_you_page.is_some());
        if has_thank_you {
            self.state = SessionState::ShowingThankYou { last_page: current };
            self.events.push_back(FormEvent::ThankYouShown);
        } else {
            self.start_over();
        }
        NavigationOutcome::Submitted {
            thank_you: has_thank_you,
        }
    }

    /// Unconditional reset to the first logical page. Submissions are kept.
    pub fn reset(&mut self) -> NavigationOutcome {
        if self.is_invalid() {
            return NavigationOutcome::Ignored;
        }
        self.events.push_back(FormEvent::Reset);
        self.start_over();
        NavigationOutcome::Reset
    }

    pub fn restart(&mut self) -> NavigationOutcome {
        self.reset()
    }

    /// Leaves the thank-you page for the page that was submitted, with the
    /// submitted values intact.
    pub fn back_from_thank_you(&mut self) -> NavigationOutcome {
        let SessionState::ShowingThankYou { last_page } = self.state else {
            return NavigationOutcome::Ignored;
        };
        self.state = SessionState::OnPage { page: last_page };
        self.submitted = false;
        self.revalidate();
        self.emit_page_change(last_page, None);
        NavigationOutcome::Moved {
            from: last_page,
            to: last_page,
        }
    }

    /// Deep link: jumps to `page_id` and restarts history there.
    pub fn go_to_page(&mut self, page_id: &str) -> NavigationOutcome {
        if self.is_invalid() || self.settings.disabled {
            return NavigationOutcome::Ignored;
        }
        let Some(position) = self
            .definition
            .as_ref()
            .and_then(|definition| definition.page_position(page_id))
        else {
            warn!(page = %page_id, "goToPage target not found");
            return NavigationOutcome::Unchanged;
        };
        let target = RawIndex(position);
        let from = self.current_raw();
        self.history = vec![target];
        self.state = SessionState::OnPage { page: target };
        self.submitted = false;
        self.revalidate();
        self.emit_page_change(target, from);
        NavigationOutcome::Moved {
            from: from.unwrap_or(target),
            to: target,
        }
    }

    /// Runs the action bound to `event` on a component of the current page.
    pub fn trigger(&mut self, component_id: &str, event: HandlerEvent) -> NavigationOutcome {
        let action = self
            .current_component(component_id)
            .and_then(|component| component.event_handlers.action_for(event))
            .cloned();
        match action {
            Some(action) => self.run_action(action),
            None => NavigationOutcome::Unchanged,
        }
    }

    fn run_action(&mut self, action: Action) -> NavigationOutcome {
        match action {
            Action::Next => self.next(),
            Action::Previous => self.previous(),
            Action::Submit => self.submit(),
            Action::Reset => self.reset(),
            Action::GoToPage { page_id } => self.go_to_page(&page_id),
            Action::SetValue { field, value } => {
                if self.apply_value(&field, value) {
                    NavigationOutcome::Updated
                } else {
                    NavigationOutcome::Ignored
                }
            }
        }
    }

    // -- internals -------------------------------------------------------

    fn navigable_page(&self) -> Option<RawIndex> {
        if self.settings.disabled {
            return None;
        }
        self.current_raw()
    }

    fn page_at(&self, raw: RawIndex) -> Option<&Page> {
        self.definition.as_ref()?.pages.get(raw.0)
    }

    fn current_component(&self, id: &str) -> Option<&Component> {
        find_component(&self.current_page()?.components, id)
    }

    fn blocked(&self) -> NavigationOutcome {
        NavigationOutcome::Blocked {
            fields: self.errors.keys().cloned().collect(),
        }
    }

    fn move_to(&mut self, from: RawIndex, to: RawIndex) -> NavigationOutcome {
        self.state = SessionState::OnPage { page: to };
        self.submitted = false;
        self.revalidate();
        self.emit_page_change(to, Some(from));
        debug!(%from, %to, "page changed");
        NavigationOutcome::Moved { from, to }
    }

    /// Expression pass followed by validation of the current page.
    fn refresh(&mut self) {
        if self.definition.is_none() {
            return;
        }
        self.overrides = self.expressions.evaluate(&mut self.values, &self.errors);
        self.revalidate();
    }

    fn revalidate(&mut self) {
        let (Some(definition), Some(raw)) = (&self.definition, self.current_raw()) else {
            self.errors.clear();
            return;
        };
        let Some(page) = definition.pages.get(raw.0) else {
            self.errors.clear();
            return;
        };
        let messages = MessageResolver::new(&self.translations, &self.settings.custom_texts);
        let validator = Validator::new(messages).with_overrides(&self.overrides);
        self.errors = validator.validate_page(page, &self.values);
    }

    fn page_event(&self, raw: RawIndex, previous: Option<RawIndex>) -> Option<PageChangeEvent> {
        let definition = self.definition.as_ref()?;
        let page = definition.pages.get(raw.0)?;
        let previous_page = previous.and_then(|previous| definition.pages.get(previous.0));
        Some(PageChangeEvent {
            page_id: page.id.clone(),
            page_index: self.order.to_logical(raw).map(|index| index.0).unwrap_or(0),
            page_title: self.translations.page_title(&page.id, &page.title),
            total_pages: self.order.total_count(),
            is_first_page: self.order.is_first(&page.id),
            is_last_page: self.order.is_last(&page.id),
            is_end_page: page.is_end_page,
            is_confirmation_page: page.is_confirmation_page,
            previous_page_id: previous_page.map(|page| page.id.clone()),
            previous_page_index: previous
                .and_then(|previous| self.order.to_logical(previous))
                .map(|index| index.0),
        })
    }

    fn emit_page_change(&mut self, raw: RawIndex, previous: Option<RawIndex>) {
        if let Some(event) = self.page_event(raw, previous) {
            self.events.push_back(FormEvent::PageChanged(event));
        }
    }
}

/// Top-level field id of a value path (`people[0].name` -> `people`).
fn root_of(path: &str) -> &str {
    path.split(['.', '[']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_of_strips_indexes_and_children() {
        assert_eq!(root_of("people[0].name"), "people");
        assert_eq!(root_of("address.city"), "address");
        assert_eq!(root_of("email"), "email");
    }
}
