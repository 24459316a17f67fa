use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::expr::{
    ExpressionContext, ExpressionError, ExpressionEvaluator, ExpressionResult, field_of, parse,
};
use crate::spec::component::{Component, walk_components};
use crate::spec::expression::{ExpressionConfig, ExpressionMode};
use crate::spec::form::FormDefinition;
use crate::validate::ValidationErrors;
use crate::values::FormValues;

/// What one expression-backed component contributes to a render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldExpressionState {
    pub value: Option<Value>,
    pub visible: Option<bool>,
    pub valid: Option<bool>,
    pub disabled: Option<bool>,
    pub required: Option<bool>,
    pub label: Option<String>,
    pub helper_text: Option<String>,
    pub error: Option<ExpressionError>,
}

/// Per-component results of an expression pass, consulted by visibility,
/// validation and rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionOverrides {
    fields: BTreeMap<String, FieldExpressionState>,
}

impl ExpressionOverrides {
    pub fn get(&self, id: &str) -> Option<&FieldExpressionState> {
        self.fields.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldExpressionState)> {
        self.fields.iter()
    }

    pub fn value(&self, id: &str) -> Option<&Value> {
        self.get(id).and_then(|state| state.value.as_ref())
    }

    pub fn visible(&self, id: &str) -> Option<bool> {
        self.get(id).and_then(|state| state.visible)
    }

    pub fn valid(&self, id: &str) -> Option<bool> {
        self.get(id).and_then(|state| state.valid)
    }

    pub fn disabled(&self, id: &str) -> Option<bool> {
        self.get(id).and_then(|state| state.disabled)
    }

    pub fn required(&self, id: &str) -> Option<bool> {
        self.get(id).and_then(|state| state.required)
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(|state| state.label.as_deref())
    }

    pub fn helper_text(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(|state| state.helper_text.as_deref())
    }

    pub fn error(&self, id: &str) -> Option<&ExpressionError> {
        self.get(id).and_then(|state| state.error.as_ref())
    }

    /// Components whose expression failed in this pass.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &ExpressionError)> {
        self.fields
            .iter()
            .filter_map(|(id, state)| state.error.as_ref().map(|err| (id.as_str(), err)))
    }
}

#[derive(Debug, Clone)]
struct ExpressionField {
    id: String,
    config: ExpressionConfig,
    /// Raw paths the expression reads, namespaces included.
    reads: Vec<String>,
    /// Field ids the expression depends on.
    dependencies: Vec<String>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    inputs: Vec<Option<Value>>,
    result: ExpressionResult,
}

/// Form-level expression pass: evaluates expression-backed components in
/// dependency order, feeding computed values back into the values map.
#[derive(Debug, Clone, Default)]
pub struct ExpressionEngine {
    evaluator: ExpressionEvaluator,
    order: Vec<ExpressionField>,
    circular: BTreeMap<String, Vec<String>>,
    known_fields: BTreeSet<String>,
    required: BTreeMap<String, bool>,
    cache: BTreeMap<String, CacheEntry>,
    last: BTreeMap<String, FieldExpressionState>,
    deferred: BTreeSet<String>,
}

impl ExpressionEngine {
    pub fn new(definition: &FormDefinition) -> Self {
        Self::with_evaluator(definition, ExpressionEvaluator::new())
    }

    pub fn with_evaluator(definition: &FormDefinition, evaluator: ExpressionEvaluator) -> Self {
        let mut declared = Vec::new();
        let mut required = BTreeMap::new();
        for page in &definition.pages {
            walk_components(&page.components, &mut |component: &Component| {
                if component.is_field() {
                    required.insert(component.id.clone(), component.validation.required);
                }
                if let Some(config) = &component.expression {
                    declared.push(expression_field(&component.id, config));
                }
            });
        }

        let (order, circular) = dependency_order(declared);
        if !circular.is_empty() {
            debug!(fields = ?circular.keys().collect::<Vec<_>>(), "circular expression dependencies");
        }

        Self {
            evaluator,
            order,
            circular,
            known_fields: definition.field_ids(),
            required,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn config(&self, id: &str) -> Option<&ExpressionConfig> {
        self.order
            .iter()
            .find(|field| field.id == id)
            .map(|field| &field.config)
    }

    /// Expression-backed components in evaluation order.
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order.iter().map(|field| field.id.as_str()).collect()
    }

    /// Cycle reported for a component, first element repeated at the end.
    pub fn cycle(&self, id: &str) -> Option<&[String]> {
        self.circular.get(id).map(Vec::as_slice)
    }

    /// Expression-backed components that read `field` directly.
    pub fn dependents_of(&self, field: &str) -> Vec<&str> {
        self.order
            .iter()
            .filter(|expr| {
                expr.dependencies
                    .iter()
                    .any(|dependency| path_refers_to(dependency, field))
            })
            .map(|expr| expr.id.as_str())
            .collect()
    }

    /// Holds back re-evaluation of `id` until [`release`](Self::release).
    /// Deferred components keep the state of their last evaluation.
    pub fn defer(&mut self, id: &str) {
        self.deferred.insert(id.to_string());
    }

    pub fn release(&mut self, id: &str) {
        self.deferred.remove(id);
        self.cache.remove(id);
    }

    pub fn is_deferred(&self, id: &str) -> bool {
        self.deferred.contains(id)
    }

    /// Drops every cached result and deferral.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.last.clear();
        self.deferred.clear();
    }

    /// Runs one pass. Value-mode results are written into `values`; failing
    /// expressions leave the stored value untouched.
    pub fn evaluate(&mut self, values: &mut FormValues, errors: &ValidationErrors) -> ExpressionOverrides {
        let mut overrides = ExpressionOverrides::default();
        if self.order.is_empty() {
            return overrides;
        }

        let validation = self
            .known_fields
            .iter()
            .map(|field| (field.clone(), !errors.contains_key(field)))
            .collect();
        let first_errors = errors
            .iter()
            .filter_map(|(field, messages)| messages.first().map(|first| (field.clone(), first.clone())))
            .collect();
        let mut ctx = ExpressionContext::new(values.clone())
            .with_known_fields(self.known_fields.iter().cloned())
            .with_validation(validation)
            .with_required(self.required.clone())
            .with_errors(first_errors);

        for field in &self.order {
            if let Some(cycle) = self.circular.get(&field.id) {
                let state = FieldExpressionState {
                    error: Some(ExpressionError::Circular(cycle.clone())),
                    ..FieldExpressionState::default()
                };
                overrides.fields.insert(field.id.clone(), state);
                continue;
            }
            if self.deferred.contains(&field.id) {
                if let Some(previous) = self.last.get(&field.id) {
                    overrides.fields.insert(field.id.clone(), previous.clone());
                }
                continue;
            }

            ctx.set_current(ctx.values().lookup(&field.id).cloned());
            let inputs: Vec<Option<Value>> = field
                .reads
                .iter()
                .map(|path| ctx.resolve(path).ok())
                .collect();
            let cached = self
                .cache
                .get(&field.id)
                .filter(|entry| field.config.cache && entry.inputs == inputs)
                .map(|entry| entry.result.clone());
            let result = match cached {
                Some(result) => result,
                None => {
                    let result = self.evaluator.evaluate(&field.config, &ctx);
                    if let Some(err) = &result.error {
                        debug!(field = %field.id, error = %err, "expression failed");
                    }
                    self.cache.insert(
                        field.id.clone(),
                        CacheEntry {
                            inputs,
                            result: result.clone(),
                        },
                    );
                    result
                }
            };

            let state = apply_result(field, &result, &mut ctx, values);
            self.last.insert(field.id.clone(), state.clone());
            overrides.fields.insert(field.id.clone(), state);
        }

        overrides
    }
}

fn apply_result(
    field: &ExpressionField,
    result: &ExpressionResult,
    ctx: &mut ExpressionContext,
    values: &mut FormValues,
) -> FieldExpressionState {
    let mut state = FieldExpressionState {
        error: result.error.clone(),
        ..FieldExpressionState::default()
    };
    if !result.success {
        return state;
    }
    match field.config.mode {
        ExpressionMode::Value => {
            if ctx.values().lookup(&field.id) != Some(&result.value) {
                values.set(&field.id, result.value.clone());
                ctx.values_mut().set(&field.id, result.value.clone());
            }
            state.value = Some(result.value.clone());
        }
        ExpressionMode::Visibility => state.visible = result.as_bool(),
        ExpressionMode::Validation => state.valid = result.as_bool(),
        ExpressionMode::Disabled => state.disabled = result.as_bool(),
        ExpressionMode::Required => state.required = result.as_bool(),
        ExpressionMode::Label => state.label = result.as_text(),
        ExpressionMode::HelperText => state.helper_text = result.as_text(),
    }
    state
}

fn expression_field(id: &str, config: &ExpressionConfig) -> ExpressionField {
    let reads = if config.dependencies.is_empty() {
        parse(&config.expression)
            .map(|expr| expr.references())
            .unwrap_or_default()
    } else {
        config.dependencies.clone()
    };
    let mut dependencies: Vec<String> = Vec::new();
    for field in reads.iter().filter_map(|path| field_of(path)) {
        if !dependencies.iter().any(|known| known == field) {
            dependencies.push(field.to_string());
        }
    }
    ExpressionField {
        id: id.to_string(),
        config: config.clone(),
        reads,
        dependencies,
    }
}

/// Whether a dependency path (`address.city`, `items[0]`) reads field `id`.
fn path_refers_to(path: &str, id: &str) -> bool {
    path == id
        || path
            .strip_prefix(id)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}

/// Orders expression fields so every field follows the expression fields it
/// reads. Fields on a cycle are reported with the cycle path and placed after
/// the acyclic ones; declaration order breaks ties.
fn dependency_order(
    declared: Vec<ExpressionField>,
) -> (Vec<ExpressionField>, BTreeMap<String, Vec<String>>) {
    let count = declared.len();
    // edges[i] holds the expression fields that field i reads
    let edges: Vec<Vec<usize>> = declared
        .iter()
        .map(|field| {
            (0..count)
                .filter(|&other| {
                    field
                        .dependencies
                        .iter()
                        .any(|dependency| path_refers_to(dependency, &declared[other].id))
                })
                .collect()
        })
        .collect();

    let mut placed = vec![false; count];
    let mut sequence = Vec::with_capacity(count);
    loop {
        let ready = (0..count).find(|&index| {
            !placed[index]
                && edges[index]
                    .iter()
                    .all(|&dependency| placed[dependency])
        });
        match ready {
            Some(index) => {
                placed[index] = true;
                sequence.push(index);
            }
            None => break,
        }
    }

    let mut circular = BTreeMap::new();
    for index in 0..count {
        if placed[index] {
            continue;
        }
        if let Some(cycle) = find_cycle(index, &edges) {
            let path = cycle
                .iter()
                .map(|&position| declared[position].id.clone())
                .collect();
            circular.insert(declared[index].id.clone(), path);
        }
        sequence.push(index);
    }

    let mut slots: Vec<Option<ExpressionField>> = declared.into_iter().map(Some).collect();
    let order = sequence
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect();
    (order, circular)
}

/// Shortest path from `start` back to itself, if one exists.
fn find_cycle(start: usize, edges: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; edges.len()];
    let mut queue = std::collections::VecDeque::from([start]);
    let mut seen = vec![false; edges.len()];
    while let Some(node) = queue.pop_front() {
        for &next in &edges[node] {
            if next == start {
                let mut path = vec![start];
                let mut cursor = node;
                while cursor != start {
                    path.push(cursor);
                    cursor = parent[cursor]?;
                }
                path.push(start);
                let end = path.len() - 1;
                path[1..end].reverse();
                return Some(path);
            }
            if !seen[next] {
                seen[next] = true;
                parent[next] = Some(node);
                queue.push_back(next);
            }
        }
    }
    None
}
