use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action executed when a component event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Next,
    Previous,
    Submit,
    Reset,
    GoToPage {
        #[serde(rename = "pageId")]
        page_id: String,
    },
    SetValue {
        field: String,
        #[serde(default)]
        value: Value,
    },
}

/// Events a component can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerEvent {
    Click,
    Change,
    Submit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventHandlers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_click: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_change: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_submit: Option<Action>,
}

impl EventHandlers {
    pub fn action_for(&self, event: HandlerEvent) -> Option<&Action> {
        match event {
            HandlerEvent::Click => self.on_click.as_ref(),
            HandlerEvent::Change => self.on_change.as_ref(),
            HandlerEvent::Submit => self.on_submit.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_click.is_none() && self.on_change.is_none() && self.on_submit.is_none()
    }
}
