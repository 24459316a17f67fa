#![allow(missing_docs)]

pub mod computed;
pub mod debounce;
pub mod events;
pub mod expr;
pub mod i18n;
pub mod messages;
pub mod options;
pub mod page_order;
pub mod session;
pub mod settings;
pub mod spec;
pub mod submission;
pub mod summary;
pub mod template;
pub mod validate;
pub mod values;
pub mod visibility;

pub use computed::{ExpressionEngine, ExpressionOverrides, FieldExpressionState};
pub use debounce::{Clock, DebounceScheduler, ManualClock, SystemClock};
pub use events::{FormEvent, PageChangeEvent};
pub use expr::{
    ExpressionContext, ExpressionError, ExpressionErrorKind, ExpressionEvaluator, ExpressionResult,
};
pub use i18n::{Dictionary, TranslationService, Translations};
pub use messages::{ErrorKind, MessageResolver, UiText};
pub use options::{ResolvedOptions, options_for};
pub use page_order::{LogicalIndex, LogicalPage, LogicalPageOrder, RawIndex, compute_logical_order};
pub use session::{FormSession, NavigationOutcome, SessionState, SubmitError, SubmitHandler};
pub use settings::{FormSettings, SettingsError, SettingsFormat};
pub use spec::{
    Action, Component, ComponentKind, DefinitionError, DefinitionWarning, FormDefinition,
    FormDocument, HandlerEvent, Page,
};
pub use submission::{RecordEncodingError, SubmissionRecord};
pub use summary::{SummaryEntry, SummarySection, confirmation_summary};
pub use template::{ResolutionMode, TemplateError, TemplateVariableResolver};
pub use validate::{ValidationErrors, Validator};
pub use values::FormValues;
pub use visibility::{VisibilityMap, is_visible, resolve_visibility};

/// JSON Schema of the serialized form definition document.
pub fn definition_schema() -> schemars::Schema {
    schemars::schema_for!(FormDocument)
}
