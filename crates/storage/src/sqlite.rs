use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use crate::error::StorageError;
use crate::flatten::flatten_document;
use crate::traits::{Mirror, SNAPSHOT_KEY};

/// A [`Mirror`] backed by a single SQLite table.
///
/// SQLite calls run on the blocking pool so that a slow disk never stalls
/// the async tasks sharing the runtime.
#[derive(Clone)]
pub struct SqliteMirror {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMirror {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.to_string(),
            source,
        })?;
        Self::init(conn, path)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::init(conn, ":memory:")
    }

    fn init(conn: Connection, path: &str) -> Result<Self, StorageError> {
        crate::schema::init_schema(&conn).map_err(|e| match e {
            StorageError::Sqlite(source) => StorageError::Open {
                path: path.to_string(),
                source,
            },
            other => other,
        })?;
        debug!(path, "opened mirror");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&lock(&conn))).await?
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Mirror for SqliteMirror {
    async fn load(&self) -> Result<Option<Value>, StorageError> {
        let text = self
            .with_conn(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM state WHERE key = ?1",
                        [SNAPSHOT_KEY],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?)
            })
            .await?;
        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, snapshot: &Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(&flatten_document(snapshot))?;
        let len = text.len();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO state (key, value) VALUES (?1, ?2)",
                rusqlite::params![SNAPSHOT_KEY, text],
            )?;
            Ok(())
        })
        .await?;
        debug!(bytes = len, "stored snapshot");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM state", [])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn empty_mirror_loads_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let mirror = SqliteMirror::open_in_memory()?;
        assert_eq!(mirror.load().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn store_flattens_and_replaces() -> Result<(), Box<dyn std::error::Error>> {
        let mirror = SqliteMirror::open_in_memory()?;
        mirror.store(&json!({"project": {"a": {"id": "a", "name": null}}})).await?;
        mirror.store(&json!({"project": {"b": {"id": "b", "tags": [null, "x"]}}})).await?;
        assert_eq!(
            mirror.load().await?,
            Some(json!({"project": {"b": {"id": "b", "tags": ["x"]}}}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn clear_removes_document() -> Result<(), Box<dyn std::error::Error>> {
        let mirror = SqliteMirror::open_in_memory()?;
        mirror.store(&json!({"prompt": {"p": {"id": "p"}}})).await?;
        mirror.clear().await?;
        assert_eq!(mirror.load().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mirror.db");
        let path = path.to_str().ok_or("non-utf8 path")?;
        {
            let mirror = SqliteMirror::open(path)?;
            mirror.store(&json!({"project": {"a": {"id": "a"}}})).await?;
        }
        let mirror = SqliteMirror::open(path)?;
        assert_eq!(mirror.load().await?, Some(json!({"project": {"a": {"id": "a"}}})));
        Ok(())
    }

    #[test]
    fn newer_file_fails_to_open_as_blocked() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mirror.db");
        let path = path.to_str().ok_or("non-utf8 path")?;
        Connection::open(path)?.execute_batch("PRAGMA user_version = 99;")?;
        let err = SqliteMirror::open(path).err().ok_or("open should fail")?;
        assert!(err.is_open_failure());
        assert!(matches!(err, StorageError::Blocked { found: 99, .. }));
        Ok(())
    }
}
