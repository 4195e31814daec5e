//! Row identity

use std::fmt;

/// How a visible row is addressed.
///
/// Local rows only know their client token. Remote rows know the server's
/// point id and, when the scroll records carried one, the durable id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowId {
    /// A row added in this or a previous session, addressed by its token.
    Local(String),
    /// A row fetched from the server.
    Remote {
        server_id: String,
        durable_id: Option<String>,
    },
}

impl RowId {
    /// Returns the id the grid shows for this row.
    pub fn visible(&self) -> &str {
        match self {
            Self::Local(token) => token,
            Self::Remote { server_id, .. } => server_id,
        }
    }

    /// Returns `true` for locally created rows.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Resolves the identifier writes must use.
    pub fn durable(&self) -> DurableId {
        match self {
            Self::Local(token) => DurableId::Local(token.clone()),
            Self::Remote {
                durable_id: Some(id),
                ..
            } => DurableId::Record(id.clone()),
            Self::Remote { server_id, .. } => DurableId::Visible(server_id.clone()),
        }
    }
}

/// Result of resolving a visible row id to the server's durable identifier.
///
/// Resolution never fails; the variant says how much to trust the answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DurableId {
    /// Read from the backing raw record's metadata.
    Record(String),
    /// A local row; its token is the durable id until the server says otherwise.
    Local(String),
    /// Nothing better was known, so the visible id is used as-is.
    Visible(String),
}

impl DurableId {
    /// Returns the identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Record(id) | Self::Local(id) | Self::Visible(id) => id,
        }
    }

    /// Consumes the resolution, returning the identifier string.
    pub fn into_string(self) -> String {
        match self {
            Self::Record(id) | Self::Local(id) | Self::Visible(id) => id,
        }
    }

    /// Returns `true` if the visible id had to stand in for the durable one.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Visible(_))
    }

    /// Returns the identifier unless it is a fallback.
    pub fn resolved(&self) -> Option<&str> {
        match self {
            Self::Visible(_) => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for DurableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_without_record_falls_back_to_visible() {
        let id = RowId::Remote {
            server_id: "q-9".to_string(),
            durable_id: None,
        };

        let durable = id.durable();
        assert!(durable.is_fallback());
        assert_eq!(durable.as_str(), "q-9");
        assert_eq!(durable.resolved(), None);
    }

    #[test]
    fn test_local_is_its_own_durable_id() {
        let id = RowId::Local("tmp-1".to_string());

        assert!(id.is_local());
        assert_eq!(id.durable(), DurableId::Local("tmp-1".to_string()));
        assert_eq!(id.durable().resolved(), Some("tmp-1"));
    }
}
