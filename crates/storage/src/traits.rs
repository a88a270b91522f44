use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

/// The fixed key under which the snapshot document is kept.
pub const SNAPSHOT_KEY: &str = "current";

/// A durable shadow of the entity store snapshot.
///
/// Every call is one self-contained unit of work against the single record
/// stored under [`SNAPSHOT_KEY`]. Writes replace the whole document; the last
/// completed `store` wins.
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Returns the stored document, or `None` when nothing was stored yet.
    async fn load(&self) -> Result<Option<Value>, StorageError>;

    /// Flattens and stores `snapshot`, replacing any previous document.
    async fn store(&self, snapshot: &Value) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}
