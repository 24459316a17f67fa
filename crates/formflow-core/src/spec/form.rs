use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::spec::component::{ChoiceOption, Component, ComponentDocument, walk_components};
use crate::spec::condition::VisibilityCondition;

/// Conditional override of the page-to-page link. Conditions are AND-combined;
/// a branch without conditions always matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<VisibilityCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<VisibilityCondition>,
    pub next_page: String,
}

impl Branch {
    pub fn conditions(&self) -> Vec<VisibilityCondition> {
        self.condition
            .iter()
            .chain(self.conditions.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    #[schemars(with = "Vec<ComponentDocument>")]
    pub components: Vec<Component>,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub is_end_page: bool,
    #[serde(default)]
    pub is_confirmation_page: bool,
}

impl Page {
    /// Every page id this page can link to, branches first.
    pub fn link_targets(&self) -> impl Iterator<Item = &str> {
        self.branches
            .iter()
            .map(|branch| branch.next_page.as_str())
            .chain(self.next_page.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThankYouPage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_true")]
    pub show_restart_button: bool,
    #[serde(default = "default_true")]
    pub show_back_button: bool,
}

fn default_true() -> bool {
    true
}

/// Option source referenced by choice components through `props.dataSource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataSource {
    Static {
        #[serde(default)]
        options: Vec<ChoiceOption>,
    },
    Remote {
        url: String,
    },
}

/// Root of the serialized document: `{ "app": { "pages": [...] } }`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FormDocument {
    #[serde(default)]
    pub app: Option<AppDocument>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pages: Option<Vec<Page>>,
    #[serde(default)]
    pub thank_you_page: Option<ThankYouPage>,
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSource>,
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("invalid form data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid form data: missing `app`")]
    MissingApp,
    #[error("invalid form data: missing `app.pages`")]
    MissingPages,
    #[error("no pages defined")]
    NoPages,
    #[error("duplicate page id '{0}'")]
    DuplicatePageId(String),
    #[error("duplicate component id '{component}' on page '{page}'")]
    DuplicateComponentId { page: String, component: String },
}

impl DefinitionError {
    /// Whether the definition parsed but declares nothing to render.
    pub fn is_empty_form(&self) -> bool {
        matches!(self, DefinitionError::MissingPages | DefinitionError::NoPages)
    }
}

/// Non-fatal findings reported while loading a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionWarning {
    UnresolvedNextPage { page: String, target: String },
    UnresolvedBranch { page: String, target: String },
    UnknownConditionField { component: String, field: String },
    UnknownDataSource { component: String, source: String },
}

impl fmt::Display for DefinitionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionWarning::UnresolvedNextPage { page, target } => {
                write!(f, "page '{page}' links to unknown nextPage '{target}'")
            }
            DefinitionWarning::UnresolvedBranch { page, target } => {
                write!(f, "page '{page}' has a branch to unknown page '{target}'")
            }
            DefinitionWarning::UnknownConditionField { component, field } => {
                write!(f, "component '{component}' has a condition on unknown field '{field}'")
            }
            DefinitionWarning::UnknownDataSource { component, source } => {
                write!(f, "component '{component}' references unknown data source '{source}'")
            }
        }
    }
}

/// Immutable, structurally checked form definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FormDefinition {
    pub id: String,
    pub title: String,
    pub pages: Vec<Page>,
    pub thank_you_page: Option<ThankYouPage>,
    pub data_sources: BTreeMap<String, DataSource>,
}

impl FormDefinition {
    pub fn from_json(raw: &str) -> Result<Self, DefinitionError> {
        let document: FormDocument = serde_json::from_str(raw)?;
        Self::from_document(document)
    }

    pub fn from_value(value: Value) -> Result<Self, DefinitionError> {
        let document: FormDocument = serde_json::from_value(value)?;
        Self::from_document(document)
    }

    pub fn from_document(document: FormDocument) -> Result<Self, DefinitionError> {
        let app = document.app.ok_or(DefinitionError::MissingApp)?;
        let pages = app.pages.ok_or(DefinitionError::MissingPages)?;
        if pages.is_empty() {
            return Err(DefinitionError::NoPages);
        }

        let mut page_ids = BTreeSet::new();
        for page in &pages {
            if !page_ids.insert(page.id.as_str()) {
                return Err(DefinitionError::DuplicatePageId(page.id.clone()));
            }
            let mut component_ids = BTreeSet::new();
            let mut duplicate = None;
            walk_components(&page.components, &mut |component: &Component| {
                if !component_ids.insert(component.id.clone()) && duplicate.is_none() {
                    duplicate = Some(component.id.clone());
                }
            });
            if let Some(component) = duplicate {
                return Err(DefinitionError::DuplicateComponentId {
                    page: page.id.clone(),
                    component,
                });
            }
        }

        Ok(Self {
            id: app.id.unwrap_or_else(|| "form".to_string()),
            title: app.title.unwrap_or_default(),
            pages,
            thank_you_page: app.thank_you_page,
            data_sources: app.data_sources,
        })
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == id)
    }

    /// Storage position of a page id.
    pub fn page_position(&self, id: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.id == id)
    }

    /// Ids of every value-holding component across all pages.
    pub fn field_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for page in &self.pages {
            walk_components(&page.components, &mut |component: &Component| {
                if component.is_field() {
                    ids.insert(component.id.clone());
                }
            });
        }
        ids
    }

    pub fn lint(&self) -> Vec<DefinitionWarning> {
        let mut warnings = Vec::new();
        let fields = self.field_ids();

        for page in &self.pages {
            if let Some(target) = &page.next_page
                && self.page(target).is_none()
            {
                warnings.push(DefinitionWarning::UnresolvedNextPage {
                    page: page.id.clone(),
                    target: target.clone(),
                });
            }
            for branch in &page.branches {
                if self.page(&branch.next_page).is_none() {
                    warnings.push(DefinitionWarning::UnresolvedBranch {
                        page: page.id.clone(),
                        target: branch.next_page.clone(),
                    });
                }
                for condition in branch.conditions() {
                    if !fields.contains(&condition.field) {
                        warnings.push(DefinitionWarning::UnknownConditionField {
                            component: format!("{}#branch", page.id),
                            field: condition.field.clone(),
                        });
                    }
                }
            }

            walk_components(&page.components, &mut |component: &Component| {
                for condition in &component.visibility_conditions {
                    if !fields.contains(&condition.field) {
                        warnings.push(DefinitionWarning::UnknownConditionField {
                            component: component.id.clone(),
                            field: condition.field.clone(),
                        });
                    }
                }
                if let Some(choices) = component.kind.choices()
                    && let Some(source) = &choices.data_source
                    && !self.data_sources.contains_key(source)
                {
                    warnings.push(DefinitionWarning::UnknownDataSource {
                        component: component.id.clone(),
                        source: source.clone(),
                    });
                }
            });
        }

        warnings
    }
}
