use serde::Serialize;

use crate::submission::SubmissionRecord;

/// Payload describing the page a session just arrived at. Indexes and totals
/// are logical, not storage positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageChangeEvent {
    pub page_id: String,
    pub page_index: usize,
    pub page_title: String,
    pub total_pages: usize,
    pub is_first_page: bool,
    pub is_last_page: bool,
    pub is_end_page: bool,
    pub is_confirmation_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page_index: Option<usize>,
}

/// Notifications queued by a session until the host drains them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum FormEvent {
    PageChanged(PageChangeEvent),
    Submitted(SubmissionRecord),
    ThankYouShown,
    Reset,
}

impl FormEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FormEvent::PageChanged(_) => "pageChanged",
            FormEvent::Submitted(_) => "submitted",
            FormEvent::ThankYouShown => "thankYouShown",
            FormEvent::Reset => "reset",
        }
    }
}
