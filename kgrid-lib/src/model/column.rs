//! Column configuration and the backend <-> display name mapping

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::Value;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Integer,
}

/// Configuration for one table column.
///
/// `db_name` is the immutable backend field key; `name` is the label users see
/// and may rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    pub db_name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default)]
    pub is_indexed: bool,
    #[serde(default)]
    pub column_use: String,
}

fn default_true() -> bool {
    true
}

impl ColumnConfig {
    /// Creates a filterable string column.
    pub fn new(name: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_name: db_name.into(),
            column_type: ColumnType::String,
            filterable: true,
            is_indexed: false,
            column_use: String::new(),
        }
    }

    /// Sets the column type.
    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    /// Sets whether the column accepts filters.
    pub fn with_filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }
}

/// Translates between backend field ids and display names.
///
/// Unknown fields pass through unchanged in both directions, so tables whose
/// config lags behind the data still render every cell.
///
/// # Example
///
/// ```
/// use kgrid_lib::model::{ColumnConfig, ColumnMapper};
///
/// let mapper = ColumnMapper::new(vec![ColumnConfig::new("Company", "company_name")]);
/// assert_eq!(mapper.display_name("company_name"), "Company");
/// assert_eq!(mapper.db_name("Company"), "company_name");
/// assert_eq!(mapper.db_name("Notes"), "Notes");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ColumnMapper {
    columns: Vec<ColumnConfig>,
    display_by_db: HashMap<String, String>,
    db_by_display: HashMap<String, String>,
}

impl ColumnMapper {
    /// Builds the mapper by inverting each column's `db_name -> name`.
    pub fn new(columns: Vec<ColumnConfig>) -> Self {
        let mut mapper = Self {
            columns,
            ..Self::default()
        };
        mapper.reindex();
        mapper
    }

    fn reindex(&mut self) {
        self.display_by_db = self
            .columns
            .iter()
            .map(|c| (c.db_name.clone(), c.name.clone()))
            .collect();
        self.db_by_display = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.db_name.clone()))
            .collect();
    }

    /// Returns the configured columns.
    pub fn columns(&self) -> &[ColumnConfig] {
        &self.columns
    }

    /// Returns the display name for a backend field id.
    pub fn display_name<'a>(&'a self, db_name: &'a str) -> &'a str {
        self.display_by_db
            .get(db_name)
            .map(String::as_str)
            .unwrap_or(db_name)
    }

    /// Returns the backend field id for a display name.
    pub fn db_name<'a>(&'a self, display: &'a str) -> &'a str {
        self.db_by_display
            .get(display)
            .map(String::as_str)
            .unwrap_or(display)
    }

    /// Returns the config of a column by display name.
    pub fn column(&self, display: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.name == display)
    }

    /// Returns `true` unless the column is configured as not filterable.
    pub fn is_filterable(&self, display: &str) -> bool {
        self.column(display).is_none_or(|c| c.filterable)
    }

    /// Changes the display label of a column. Returns `false` if unknown.
    pub fn rename(&mut self, db_name: &str, name: impl Into<String>) -> bool {
        let Some(column) = self.columns.iter_mut().find(|c| c.db_name == db_name) else {
            return false;
        };
        column.name = name.into();
        self.reindex();
        true
    }

    /// Maps backend column ids to display names, preserving order.
    pub fn display_columns(&self, db_columns: &[String]) -> Vec<String> {
        db_columns
            .iter()
            .filter(|c| c.as_str() != "id")
            .map(|c| self.display_name(c).to_string())
            .collect()
    }

    /// Converts a raw backend row into display-keyed cells.
    ///
    /// The `id` key is left out; callers read it separately.
    pub fn to_display(
        &self,
        raw: serde_json::Map<String, serde_json::Value>,
    ) -> HashMap<String, Value> {
        raw.into_iter()
            .filter(|(key, _)| key != "id")
            .map(|(key, value)| (self.display_name(&key).to_string(), Value::from_json(value)))
            .collect()
    }

    /// Converts display-keyed cells into a backend payload.
    ///
    /// Numeric strings bound for integer columns are sent as integers.
    pub fn to_backend(
        &self,
        fields: &HashMap<String, Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        fields
            .iter()
            .map(|(display, value)| {
                let value = match (self.column(display), value) {
                    (Some(c), Value::String(s)) if c.column_type == ColumnType::Integer => s
                        .trim()
                        .parse::<i64>()
                        .map(Value::Int)
                        .unwrap_or_else(|_| value.clone()),
                    _ => value.clone(),
                };
                (self.db_name(display).to_string(), value.into_json())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> ColumnMapper {
        ColumnMapper::new(vec![
            ColumnConfig::new("Company", "company_name"),
            ColumnConfig::new("Seats", "seat_count").with_type(ColumnType::Integer),
        ])
    }

    #[test]
    fn test_to_display_renames_known_fields() {
        let raw = serde_json::json!({"id": "q1", "company_name": "Acme", "extra": 1});
        let serde_json::Value::Object(raw) = raw else {
            unreachable!()
        };

        let cells = mapper().to_display(raw);
        assert_eq!(cells.get("Company"), Some(&Value::from("Acme")));
        assert_eq!(cells.get("extra"), Some(&Value::Int(1)));
        assert!(!cells.contains_key("id"));
    }

    #[test]
    fn test_to_backend_coerces_integer_columns() {
        let fields = HashMap::from([
            ("Company".to_string(), Value::from("Acme")),
            ("Seats".to_string(), Value::from(" 42 ")),
        ]);

        let payload = mapper().to_backend(&fields);
        assert_eq!(payload["company_name"], serde_json::json!("Acme"));
        assert_eq!(payload["seat_count"], serde_json::json!(42));
    }

    #[test]
    fn test_rename_updates_both_directions() {
        let mut mapper = mapper();
        assert!(mapper.rename("company_name", "Account"));

        assert_eq!(mapper.display_name("company_name"), "Account");
        assert_eq!(mapper.db_name("Account"), "company_name");
        assert_eq!(mapper.db_name("Company"), "Company");
    }

    #[test]
    fn test_column_config_deserializes_type_key() {
        let json = r#"{"name": "Seats", "db_name": "seat_count", "type": "integer", "filterable": false, "is_indexed": true, "column_use": "metric"}"#;
        let column: ColumnConfig = serde_json::from_str(json).unwrap();

        assert_eq!(column.column_type, ColumnType::Integer);
        assert!(!column.filterable);
        assert!(column.is_indexed);
    }
}
