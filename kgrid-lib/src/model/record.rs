//! Raw scroll records

use serde::Deserialize;
use serde::Serialize;

/// A raw record returned alongside scroll rows.
///
/// Carries the server point id and, inside the payload metadata, the row's
/// durable domain identifier.
///
/// ```
/// use kgrid_lib::model::RawRecord;
///
/// let record: RawRecord = serde_json::from_str(
///     r#"{"qdrant_id": "q-1", "payload": {"metadata": {"original_id": "acme-01"}}}"#,
/// ).unwrap();
/// assert_eq!(record.original_id(), Some("acme-01"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub qdrant_id: String,
    #[serde(default)]
    pub payload: RecordPayload,
}

/// Payload section of a [`RawRecord`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(default)]
    pub metadata: RecordMetadata,
}

/// Metadata section of a [`RecordPayload`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
}

impl RawRecord {
    /// Creates a record with no durable id.
    pub fn new(qdrant_id: impl Into<String>) -> Self {
        Self {
            qdrant_id: qdrant_id.into(),
            payload: RecordPayload::default(),
        }
    }

    /// Sets the durable id (builder pattern).
    pub fn with_original_id(mut self, original_id: impl Into<String>) -> Self {
        self.payload.metadata.original_id = Some(original_id.into());
        self
    }

    /// Returns the durable id, if the server recorded one.
    pub fn original_id(&self) -> Option<&str> {
        self.payload
            .metadata
            .original_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}
