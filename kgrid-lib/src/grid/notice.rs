//! Operation kinds and user-facing notices

use std::fmt;

use chrono::DateTime;
use chrono::Utc;

/// The grid operations that report progress and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Load,
    AddRow,
    Save,
    Delete,
    /// Writing the local overlay snapshot.
    Persist,
    /// Reading the local overlay snapshot.
    Restore,
    /// Reading or writing the table metadata record.
    Metadata,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Load => "Loading",
            Self::AddRow => "Adding row",
            Self::Save => "Saving",
            Self::Delete => "Deleting",
            Self::Persist => "Saving local changes",
            Self::Restore => "Restoring local changes",
            Self::Metadata => "Updating table metadata",
        };
        f.write_str(label)
    }
}

/// A transient message for the user, typically shown as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: OperationKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    /// Creates a notice stamped now.
    pub fn new(kind: OperationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// Creates a failure notice from an error.
    pub fn failure(kind: OperationKind, error: &impl fmt::Display) -> Self {
        Self::new(kind, format!("{kind} failed: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_names_the_operation() {
        let notice = Notice::failure(OperationKind::Delete, &"HTTP 503: unavailable");
        assert_eq!(notice.message, "Deleting failed: HTTP 503: unavailable");
    }
}
