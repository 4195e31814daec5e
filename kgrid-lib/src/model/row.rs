//! Dynamic table row

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::Value;

/// A single grid row.
///
/// Rows hold cell values keyed by *display* column name, plus the mandatory
/// `id`. For server rows the id is the server-issued point id; for rows added
/// locally it is a client-generated token.
///
/// Rows serialise as one flat JSON object, the same shape the local overlay
/// snapshot uses:
///
/// ```
/// use kgrid_lib::model::Row;
///
/// let row = Row::new("tmp-1").set("Name", "Acme");
/// let json = serde_json::to_value(&row).unwrap();
/// assert_eq!(json, serde_json::json!({"id": "tmp-1", "Name": "Acme"}));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    id: String,
    #[serde(flatten)]
    fields: HashMap<String, Value>,
}

impl Row {
    /// Creates a new empty row with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    /// Creates a row from an id and a prepared field map.
    ///
    /// An `id` key inside `fields` is dropped; the explicit id wins.
    pub fn with_fields(id: impl Into<String>, mut fields: HashMap<String, Value>) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Returns the row id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns a reference to the cell value, if it exists.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Returns the cell rendered as display text, empty when missing.
    pub fn text(&self, column: &str) -> String {
        self.fields
            .get(column)
            .map(Value::to_display_string)
            .unwrap_or_default()
    }

    /// Returns a reference to all fields.
    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    /// Consumes the row, returning its id and fields.
    pub fn into_parts(self) -> (String, HashMap<String, Value>) {
        (self.id, self.fields)
    }

    /// Sets a field value (builder pattern).
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Inserts a field value. Writes to `id` are ignored.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        if column != "id" {
            self.fields.insert(column, value.into());
        }
    }

    /// Returns a copy of this row with `patch` merged over its fields.
    pub fn patched(&self, patch: &HashMap<String, Value>) -> Self {
        let mut row = self.clone();
        for (column, value) in patch {
            row.insert(column.clone(), value.clone());
        }
        row
    }
}
