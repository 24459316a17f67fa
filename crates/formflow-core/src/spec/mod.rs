pub mod action;
pub mod component;
pub mod condition;
pub mod expression;
pub mod form;
pub mod validation;

pub use action::{Action, EventHandlers, HandlerEvent};
pub use component::{
    ArrayProps, ChoiceOption, ChoiceProps, Component, ComponentDocument, ComponentError,
    ComponentKind, ContainerProps, DateProps, InputProps, InputType, SliderRangeProps,
    find_component, walk_components,
};
pub use condition::{ConditionOperator, VisibilityCondition};
pub use expression::{ExpressionConfig, ExpressionMode};
pub use form::{
    AppDocument, Branch, DataSource, DefinitionError, DefinitionWarning, FormDefinition,
    FormDocument, Page, ThankYouPage,
};
pub use validation::ValidationRules;
