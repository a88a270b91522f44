use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::flatten::flatten_document;
use crate::traits::Mirror;

/// An in-process [`Mirror`], for ephemeral sessions and tests.
///
/// Clones share the same document, so a "reload" can be simulated by
/// building a new store over a clone.
#[derive(Clone, Default)]
pub struct MemoryMirror {
    document: Arc<RwLock<Option<Value>>>,
    unavailable: Arc<AtomicBool>,
    stores: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MemoryMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMirror")
            .field("stores", &self.store_count())
            .field("unavailable", &self.unavailable.load(Ordering::SeqCst))
            .finish()
    }
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `store` calls so far.
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// The raw stored document.
    pub fn document(&self) -> Option<Value> {
        self.document
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("memory mirror switched off".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Mirror for MemoryMirror {
    async fn load(&self) -> Result<Option<Value>, StorageError> {
        self.check()?;
        Ok(self.document())
    }

    async fn store(&self, snapshot: &Value) -> Result<(), StorageError> {
        self.check()?;
        let flat = flatten_document(snapshot);
        *self
            .document
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(flat);
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.check()?;
        *self
            .document
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn clones_share_document() -> Result<(), Box<dyn std::error::Error>> {
        let mirror = MemoryMirror::new();
        let other = mirror.clone();
        mirror.store(&json!({"a": [null, 1]})).await?;
        assert_eq!(other.load().await?, Some(json!({"a": [1]})));
        assert_eq!(other.store_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_fails_every_call() {
        let mirror = MemoryMirror::new();
        mirror.set_unavailable(true);
        assert!(mirror.load().await.is_err());
        assert!(mirror.store(&json!({})).await.is_err());
        assert!(mirror.clear().await.is_err());
        assert_eq!(mirror.store_count(), 0);
    }
}
