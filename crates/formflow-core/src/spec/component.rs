use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::spec::action::EventHandlers;
use crate::spec::condition::VisibilityCondition;
use crate::spec::expression::ExpressionConfig;
use crate::spec::validation::ValidationRules;

/// Serialized component node as it appears in a form definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visibility_conditions: Vec<VisibilityCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub array_items: Vec<ComponentDocument>,
    #[serde(default, skip_serializing_if = "EventHandlers::is_empty")]
    pub event_handlers: EventHandlers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<ExpressionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("component id must not be empty")]
    EmptyId,
    #[error("component '{id}' has unknown type '{kind}'")]
    UnknownType { id: String, kind: String },
    #[error("component '{id}' has invalid props: {message}")]
    InvalidProps { id: String, message: String },
}

/// Component node with its props resolved into the variant matching its `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ComponentDocument")]
pub struct Component {
    pub id: String,
    pub label: String,
    pub kind: ComponentKind,
    pub validation: ValidationRules,
    pub visibility_conditions: Vec<VisibilityCondition>,
    pub event_handlers: EventHandlers,
    pub expression: Option<ExpressionConfig>,
    pub helper_text: Option<String>,
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Text(TextProps),
    Input(InputProps),
    Textarea(TextareaProps),
    Select(ChoiceProps),
    Radio(ChoiceProps),
    Checkbox(ChoiceProps),
    Date(DateProps),
    SliderRange(SliderRangeProps),
    Array(ArrayProps),
    Section(ContainerProps),
    Form(ContainerProps),
    Button(ButtonProps),
    Table(TableProps),
    Html(HtmlProps),
    Confirmation(ConfirmationProps),
    /// Deprecated; parsed so old documents load, otherwise inert.
    DecisionTree,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Email,
    Number,
    Password,
    Tel,
    Url,
    #[default]
    #[serde(other)]
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextProps {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputProps {
    pub input_type: InputType,
    pub placeholder: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextareaProps {
    pub placeholder: Option<String>,
    pub rows: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChoiceProps {
    pub options: Vec<ChoiceOption>,
    pub data_source: Option<String>,
    pub multiple: bool,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateProps {
    pub min_date: Option<String>,
    pub max_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SliderRangeProps {
    #[serde(deserialize_with = "lenient_f64")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub max: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub step: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub min_range: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub max_range: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub min_value_min: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub min_value_max: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub max_value_min: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub max_value_max: Option<f64>,
}

impl Default for SliderRangeProps {
    fn default() -> Self {
        Self {
            min: Some(0.0),
            max: Some(100.0),
            step: Some(1.0),
            min_range: None,
            max_range: None,
            min_value_min: None,
            min_value_max: None,
            max_value_min: None,
            max_value_max: None,
        }
    }
}

impl SliderRangeProps {
    pub fn lower_bound(&self) -> f64 {
        self.min.unwrap_or(0.0)
    }

    pub fn upper_bound(&self) -> f64 {
        self.max.unwrap_or(100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArrayProps {
    pub add_button_text: Option<String>,
    pub remove_button_text: Option<String>,
    #[serde(skip)]
    pub items: Vec<Component>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerProps {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(skip)]
    pub children: Vec<Component>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonProps {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableProps {
    pub columns: Vec<Value>,
    pub rows: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HtmlProps {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmationProps {
    pub title: Option<String>,
    pub message: Option<String>,
}

/// Selectable option; accepts either a bare string or `{value, label}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "ChoiceOptionDocument")]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ChoiceOptionDocument {
    Plain(String),
    Detailed {
        value: Value,
        #[serde(default)]
        label: Option<String>,
    },
}

impl From<ChoiceOptionDocument> for ChoiceOption {
    fn from(doc: ChoiceOptionDocument) -> Self {
        match doc {
            ChoiceOptionDocument::Plain(value) => Self {
                label: value.clone(),
                value,
            },
            ChoiceOptionDocument::Detailed { value, label } => {
                let value = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                Self {
                    label: label.unwrap_or_else(|| value.clone()),
                    value,
                }
            }
        }
    }
}

impl TryFrom<ComponentDocument> for Component {
    type Error = ComponentError;

    fn try_from(doc: ComponentDocument) -> Result<Self, Self::Error> {
        if doc.id.trim().is_empty() {
            return Err(ComponentError::EmptyId);
        }
        let label = doc
            .label
            .clone()
            .or_else(|| string_prop(&doc.props, "label"))
            .unwrap_or_else(|| doc.id.clone());
        let helper_text = string_prop(&doc.props, "helperText");
        let default_value = doc.props.get("defaultValue").cloned();
        let children = doc
            .children
            .into_iter()
            .map(Component::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let items = doc
            .array_items
            .into_iter()
            .map(Component::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let kind = ComponentKind::from_parts(&doc.id, &doc.kind, doc.props, children, items)?;

        Ok(Self {
            id: doc.id,
            label,
            kind,
            validation: doc.validation.unwrap_or_default(),
            visibility_conditions: doc.visibility_conditions,
            event_handlers: doc.event_handlers,
            expression: doc.expression,
            helper_text,
            default_value,
        })
    }
}

impl ComponentKind {
    fn from_parts(
        id: &str,
        kind: &str,
        props: Map<String, Value>,
        children: Vec<Component>,
        items: Vec<Component>,
    ) -> Result<Self, ComponentError> {
        let parsed = match kind {
            "text" => ComponentKind::Text(parse_props(id, props)?),
            "input" => ComponentKind::Input(parse_props(id, props)?),
            "textarea" => ComponentKind::Textarea(parse_props(id, props)?),
            "select" => ComponentKind::Select(parse_props(id, props)?),
            "radio" => ComponentKind::Radio(parse_props(id, props)?),
            "checkbox" => ComponentKind::Checkbox(parse_props(id, props)?),
            "date" => ComponentKind::Date(parse_props(id, props)?),
            "slider-range" | "sliderRange" => ComponentKind::SliderRange(parse_props(id, props)?),
            "array" => {
                let mut array: ArrayProps = parse_props(id, props)?;
                array.items = items;
                ComponentKind::Array(array)
            }
            "section" | "form" => {
                let mut container: ContainerProps = parse_props(id, props)?;
                container.children = children;
                if kind == "section" {
                    ComponentKind::Section(container)
                } else {
                    ComponentKind::Form(container)
                }
            }
            "button" => ComponentKind::Button(parse_props(id, props)?),
            "table" => ComponentKind::Table(parse_props(id, props)?),
            "html" => ComponentKind::Html(parse_props(id, props)?),
            "confirmation" => ComponentKind::Confirmation(parse_props(id, props)?),
            "decisionTree" | "decision-tree" => ComponentKind::DecisionTree,
            other => {
                return Err(ComponentError::UnknownType {
                    id: id.to_string(),
                    kind: other.to_string(),
                });
            }
        };
        Ok(parsed)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::Text(_) => "text",
            ComponentKind::Input(_) => "input",
            ComponentKind::Textarea(_) => "textarea",
            ComponentKind::Select(_) => "select",
            ComponentKind::Radio(_) => "radio",
            ComponentKind::Checkbox(_) => "checkbox",
            ComponentKind::Date(_) => "date",
            ComponentKind::SliderRange(_) => "slider-range",
            ComponentKind::Array(_) => "array",
            ComponentKind::Section(_) => "section",
            ComponentKind::Form(_) => "form",
            ComponentKind::Button(_) => "button",
            ComponentKind::Table(_) => "table",
            ComponentKind::Html(_) => "html",
            ComponentKind::Confirmation(_) => "confirmation",
            ComponentKind::DecisionTree => "decisionTree",
        }
    }

    /// Whether the component owns an entry in the values map.
    pub fn is_field(&self) -> bool {
        matches!(
            self,
            ComponentKind::Input(_)
                | ComponentKind::Textarea(_)
                | ComponentKind::Select(_)
                | ComponentKind::Radio(_)
                | ComponentKind::Checkbox(_)
                | ComponentKind::Date(_)
                | ComponentKind::SliderRange(_)
                | ComponentKind::Array(_)
        )
    }

    pub fn children(&self) -> &[Component] {
        match self {
            ComponentKind::Section(container) | ComponentKind::Form(container) => {
                &container.children
            }
            _ => &[],
        }
    }

    pub fn choices(&self) -> Option<&ChoiceProps> {
        match self {
            ComponentKind::Select(choices)
            | ComponentKind::Radio(choices)
            | ComponentKind::Checkbox(choices) => Some(choices),
            _ => None,
        }
    }
}

impl Component {
    pub fn is_field(&self) -> bool {
        self.kind.is_field()
    }

    /// Depth-first search through section/form children. Array item templates
    /// are not searched because their ids are scoped per item.
    pub fn find(&self, id: &str) -> Option<&Component> {
        if self.id == id {
            return Some(self);
        }
        self.kind
            .children()
            .iter()
            .find_map(|child| child.find(id))
    }
}

/// Finds a component by id in a list of root components.
pub fn find_component<'a>(components: &'a [Component], id: &str) -> Option<&'a Component> {
    components.iter().find_map(|component| component.find(id))
}

/// Visits every component reachable through section/form children.
pub fn walk_components<'a, F>(components: &'a [Component], visit: &mut F)
where
    F: FnMut(&'a Component),
{
    for component in components {
        visit(component);
        walk_components(component.kind.children(), visit);
    }
}

fn parse_props<T: DeserializeOwned>(id: &str, props: Map<String, Value>) -> Result<T, ComponentError> {
    serde_json::from_value(Value::Object(props)).map_err(|err| ComponentError::InvalidProps {
        id: id.to_string(),
        message: err.to_string(),
    })
}

fn string_prop(props: &Map<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(Value::as_str).map(str::to_string)
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}
