//! Per-table metadata side channel

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Denormalised row count and modification time for one table.
///
/// Maintained by applying deltas after confirmed adds and deletes. It is a
/// display aid only; the scroll endpoint stays authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub row_count: u64,
    pub last_modified: DateTime<Utc>,
}

impl TableMetadata {
    /// Creates metadata stamped with the current time.
    pub fn new(row_count: u64) -> Self {
        Self {
            row_count,
            last_modified: Utc::now(),
        }
    }

    /// Returns metadata with `delta` applied to the count, stamped now.
    ///
    /// The count saturates at zero.
    pub fn with_delta(&self, delta: i64) -> Self {
        let row_count = if delta >= 0 {
            self.row_count.saturating_add(delta as u64)
        } else {
            self.row_count.saturating_sub(delta.unsigned_abs())
        };
        Self {
            row_count,
            last_modified: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_delta_saturates() {
        let meta = TableMetadata::new(1);

        assert_eq!(meta.with_delta(1).row_count, 2);
        assert_eq!(meta.with_delta(-5).row_count, 0);
        assert_eq!(meta.with_delta(0).row_count, 1);
    }
}
