//! Grid configuration

use std::time::Duration;

use crate::model::ColumnConfig;
use crate::remote::SourceKey;

/// Configuration for one [`KnowledgeGrid`](super::KnowledgeGrid).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use kgrid_lib::grid::GridConfig;
///
/// let config = GridConfig::new("table-7")
///     .with_source("leads", "ctx-1")
///     .with_page_size(50)
///     .with_filter_debounce(Duration::from_millis(100));
/// assert_eq!(config.source.source_name, "leads");
/// ```
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Table the overlay, writes and metadata belong to.
    pub table_id: String,

    /// Dataset the table scrolls over.
    ///
    /// Default: source named after the table, empty context
    pub source: SourceKey,

    /// Column configuration used to map backend fields to display names.
    pub columns: Vec<ColumnConfig>,

    /// Rows per page for navigation.
    ///
    /// Default: 20
    pub page_size: usize,

    /// Quiet period before filter input takes effect.
    ///
    /// Default: 250 ms
    pub filter_debounce: Duration,

    /// Row limit for full loads when the table metadata has no count.
    ///
    /// Default: 10 000
    pub show_all_fallback_limit: usize,

    /// Upper bound for any single remote call.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl GridConfig {
    /// Creates a config for `table_id` with default values.
    pub fn new(table_id: impl Into<String>) -> Self {
        let table_id = table_id.into();
        Self {
            source: SourceKey::new(table_id.clone(), ""),
            table_id,
            columns: Vec::new(),
            page_size: 20,
            filter_debounce: Duration::from_millis(250),
            show_all_fallback_limit: 10_000,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the scroll source.
    pub fn with_source(mut self, source_name: impl Into<String>, context_id: impl Into<String>) -> Self {
        self.source = SourceKey::new(source_name, context_id);
        self
    }

    /// Sets the column configuration.
    pub fn with_columns(mut self, columns: Vec<ColumnConfig>) -> Self {
        self.columns = columns;
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the filter debounce delay.
    pub fn with_filter_debounce(mut self, delay: Duration) -> Self {
        self.filter_debounce = delay;
        self
    }

    /// Sets the full-load fallback limit.
    pub fn with_show_all_fallback_limit(mut self, limit: usize) -> Self {
        self.show_all_fallback_limit = limit;
        self
    }

    /// Sets the remote call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
