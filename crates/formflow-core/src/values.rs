use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::spec::component::{Component, ComponentKind};
use crate::spec::form::FormDefinition;

/// One step of a field path such as `addresses[0].street`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Splits a dotted/indexed field path. Numeric dotted segments (`items.0`) are
/// treated as indexes.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        if let Some(open) = rest.find('[') {
            let key = &rest[..open];
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            rest = &rest[open..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(close) = stripped.find(']') else {
                    segments.push(PathSegment::Key(rest.to_string()));
                    rest = "";
                    break;
                };
                let inner = &stripped[..close];
                match inner.trim().parse::<usize>() {
                    Ok(index) => segments.push(PathSegment::Index(index)),
                    Err(_) => segments.push(PathSegment::Key(inner.to_string())),
                }
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                segments.push(PathSegment::Key(rest.to_string()));
            }
        } else if let Ok(index) = rest.parse::<usize>() {
            segments.push(PathSegment::Index(index));
        } else {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }
    segments
}

/// Mutable mapping from field path to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(Map<String, Value>);

impl FormValues {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps an object; any other JSON value yields an empty map.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Literal key lookup without path interpretation.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Path lookup (`a.b`, `items[0].name`), falling back to a literal key.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.0, path).or_else(|| self.0.get(path))
    }

    /// Path lookup only; a literal key containing dots is not consulted.
    pub fn lookup_path(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.0, path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Assigns a value at `path`, creating intermediate objects and arrays.
    pub fn set(&mut self, path: &str, value: Value) {
        let segments = parse_path(path);
        let Some((PathSegment::Key(first), rest)) = segments.split_first() else {
            self.0.insert(path.to_string(), value);
            return;
        };
        if rest.is_empty() {
            self.0.insert(first.clone(), value);
            return;
        }
        let slot = self
            .0
            .entry(first.clone())
            .or_insert_with(|| empty_container(&rest[0]));
        assign(slot, rest, value);
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

impl From<Map<String, Value>> for FormValues {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn lookup_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path);
    let (first, rest) = segments.split_first()?;
    let PathSegment::Key(key) = first else {
        return None;
    };
    let mut current = map.get(key)?;
    for segment in rest {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(index) => match current {
                Value::Array(items) => items.get(*index)?,
                Value::Object(object) => object.get(&index.to_string())?,
                _ => return None,
            },
        };
    }
    Some(current)
}

fn empty_container(next: &PathSegment) -> Value {
    match next {
        PathSegment::Key(_) => Value::Object(Map::new()),
        PathSegment::Index(_) => Value::Array(Vec::new()),
    }
}

fn assign(slot: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };
    match segment {
        PathSegment::Key(key) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(object) = slot {
                let child = object.entry(key.clone()).or_insert(Value::Null);
                if rest.is_empty() {
                    *child = value;
                } else {
                    if child.is_null() {
                        *child = empty_container(&rest[0]);
                    }
                    assign(child, rest, value);
                }
            }
        }
        PathSegment::Index(index) => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            let Value::Array(items) = slot else {
                return;
            };
            // Writes reach an existing item or append one; gaps are never padded.
            if *index == items.len() {
                items.push(match rest.first() {
                    Some(next) => empty_container(next),
                    None => Value::Null,
                });
            }
            let len = items.len();
            match items.get_mut(*index) {
                Some(item) => assign(item, rest, value),
                None => debug!(index = *index, len, "ignoring write past end of list"),
            }
        }
    }
}

/// Emptiness used by the required rule: absent, `null`, blank strings, empty
/// arrays and empty objects. `0` and `false` are values.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => false,
    }
}

/// Builds the type-appropriate default values for every field of a definition.
pub fn initial_values(definition: &FormDefinition) -> FormValues {
    let mut values = FormValues::new();
    for page in &definition.pages {
        seed_defaults(&page.components, &mut values);
    }
    values
}

fn seed_defaults(components: &[Component], values: &mut FormValues) {
    for component in components {
        match &component.kind {
            ComponentKind::Section(container) | ComponentKind::Form(container) => {
                seed_defaults(&container.children, values);
            }
            _ => {
                if let Some(value) = default_for(component) {
                    values.insert(component.id.clone(), value);
                }
            }
        }
    }
}

/// Default value for a single value-holding component.
pub fn default_for(component: &Component) -> Option<Value> {
    if let Some(value) = &component.default_value {
        return Some(value.clone());
    }
    let value = match &component.kind {
        ComponentKind::Input(_)
        | ComponentKind::Textarea(_)
        | ComponentKind::Radio(_)
        | ComponentKind::Date(_) => Value::String(String::new()),
        ComponentKind::Select(choices) => {
            if choices.multiple {
                Value::Array(Vec::new())
            } else {
                Value::String(String::new())
            }
        }
        ComponentKind::Checkbox(choices) => {
            if choices.options.is_empty() && choices.data_source.is_none() {
                Value::Bool(false)
            } else {
                Value::Array(Vec::new())
            }
        }
        ComponentKind::SliderRange(range) => {
            json!({ "min": range.lower_bound(), "max": range.upper_bound() })
        }
        ComponentKind::Array(array) => {
            let count = component.validation.min_items.unwrap_or(0);
            Value::Array((0..count).map(|_| empty_item(&array.items)).collect())
        }
        _ => return None,
    };
    Some(value)
}

/// A fresh record for one entry of an array component.
pub fn empty_item(items: &[Component]) -> Value {
    let mut record = FormValues::new();
    seed_defaults(items, &mut record);
    record.into_value()
}
