//! SQLite-backed persistent backend.

use std::path::Path;

use async_sqlite::Client;
use async_sqlite::ClientBuilder;
use async_sqlite::JournalMode;
use async_sqlite::rusqlite;
use async_trait::async_trait;
use chrono::Utc;

use super::StoreBackend;
use crate::error::StoreError;

/// A persistent backend backed by SQLite.
///
/// Snapshots persist across process restarts, which is what lets a CLI or a
/// desktop shell keep unsynced rows between runs. Uses WAL journal mode.
///
/// # Example
///
/// ```ignore
/// use kgrid_lib::store::SqliteBackend;
///
/// let backend = SqliteBackend::open("overlay.db").await?;
/// let backend = SqliteBackend::open_in_memory().await?;
/// ```
#[derive(Clone)]
pub struct SqliteBackend {
    client: Client,
}

impl SqliteBackend {
    /// Opens the backend at the specified path, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let client = ClientBuilder::new()
            .path(path)
            .journal_mode(JournalMode::Wal)
            .open()
            .await?;

        Self::init_schema(&client).await?;

        Ok(Self { client })
    }

    /// Opens an in-memory database. Data is lost when dropped.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let client = ClientBuilder::new().path(":memory:").open().await?;

        Self::init_schema(&client).await?;

        Ok(Self { client })
    }

    async fn init_schema(client: &Client) -> Result<(), StoreError> {
        client
            .conn(|conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS overlay (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL,
                        updated_at INTEGER NOT NULL
                    )",
                    [],
                )
            })
            .await?;
        Ok(())
    }

    /// Returns the keys currently stored.
    pub async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let keys = self
            .client
            .conn(|conn| {
                let mut stmt = conn.prepare("SELECT key FROM overlay ORDER BY key")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await?;
        Ok(keys)
    }
}

#[async_trait]
impl StoreBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        let value = self
            .client
            .conn(move |conn| {
                let mut stmt = conn.prepare("SELECT value FROM overlay WHERE key = ?")?;
                let mut rows = stmt.query([&key])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let key = key.to_string();
        let updated_at = Utc::now().timestamp();

        self.client
            .conn(move |conn| {
                conn.execute(
                    "INSERT INTO overlay (key, value, updated_at) VALUES (?, ?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    rusqlite::params![key, value, updated_at],
                )
            })
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();

        self.client
            .conn(move |conn| conn.execute("DELETE FROM overlay WHERE key = ?", [key]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_overwrites_and_remove_deletes() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();

        backend.set("k", "one".to_string()).await.unwrap();
        backend.set("k", "two".to_string()).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(backend.keys().await.unwrap(), vec!["k".to_string()]);

        backend.remove("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }
}
