//! Request and response bodies

use serde::Deserialize;
use serde::Serialize;

use crate::model::RawRecord;
use crate::page::Cursor;
use crate::remote::Point;
use crate::remote::ScrollPage;

/// Body of `POST /scroll`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollRequest<'a> {
    pub source_name: &'a str,
    pub context_id: &'a str,
    pub cursor: Option<&'a str>,
    pub limit: usize,
}

/// Response of `POST /scroll`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollResponse {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub next_page_offset: Option<serde_json::Value>,
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

impl ScrollResponse {
    /// Converts the body into a [`ScrollPage`].
    ///
    /// The next-page offset may arrive as a string or a number; both become
    /// an opaque [`Cursor`]. Null or an empty string means no next page.
    pub fn into_scroll_page(self) -> ScrollPage {
        let next_cursor = match self.next_page_offset {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(Cursor::new(s)),
            Some(serde_json::Value::Number(n)) => Some(Cursor::new(n.to_string())),
            _ => None,
        };
        ScrollPage {
            columns: self.columns,
            rows: self.rows,
            next_cursor,
            records: self.records,
        }
    }
}

/// Body of `POST /upsert`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest<'a> {
    pub table_id: &'a str,
    pub points: &'a [Point],
}

/// Body of `POST /delete`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest<'a> {
    pub table_id: &'a str,
    pub ids: &'a [String],
}
