use ciborium::Value as CborValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::values::FormValues;

/// Frozen copy of the values of one successful submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    /// Hyphenated UUID v4.
    pub id: String,
    pub form_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub values: Value,
}

#[derive(Debug, Error)]
pub enum RecordEncodingError {
    #[error("failed to encode submission as CBOR: {0}")]
    CborEncode(String),
    #[error("failed to decode submission from CBOR: {0}")]
    CborDecode(String),
}

impl SubmissionRecord {
    pub fn new(form_id: impl Into<String>, values: &FormValues) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            form_id: form_id.into(),
            submitted_at: OffsetDateTime::now_utc(),
            values: values.to_value(),
        }
    }

    /// Serializes the record as canonical CBOR bytes (map keys sorted
    /// length-first, then bytewise).
    pub fn to_cbor(&self) -> Result<Vec<u8>, RecordEncodingError> {
        let value = CborValue::serialized(self)
            .map_err(|err| RecordEncodingError::CborEncode(err.to_string()))?;
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&canonicalize(value), &mut bytes)
            .map_err(|err| RecordEncodingError::CborEncode(err.to_string()))?;
        Ok(bytes)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, RecordEncodingError> {
        ciborium::de::from_reader(bytes).map_err(|err| RecordEncodingError::CborDecode(err.to_string()))
    }

    /// Serializes the record as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn canonicalize(value: CborValue) -> CborValue {
    match value {
        CborValue::Map(entries) => {
            let mut entries: Vec<(CborValue, CborValue)> = entries
                .into_iter()
                .map(|(key, value)| (canonicalize(key), canonicalize(value)))
                .collect();
            entries.sort_by(|(left, _), (right, _)| key_order(left).cmp(&key_order(right)));
            CborValue::Map(entries)
        }
        CborValue::Array(items) => CborValue::Array(items.into_iter().map(canonicalize).collect()),
        CborValue::Tag(tag, inner) => CborValue::Tag(tag, Box::new(canonicalize(*inner))),
        other => other,
    }
}

fn key_order(key: &CborValue) -> (usize, Vec<u8>) {
    match key {
        CborValue::Text(text) => (text.len(), text.as_bytes().to_vec()),
        CborValue::Bytes(bytes) => (bytes.len(), bytes.clone()),
        CborValue::Integer(number) => {
            let number: i128 = (*number).into();
            (0, number.to_be_bytes().to_vec())
        }
        _ => (usize::MAX, Vec::new()),
    }
}
