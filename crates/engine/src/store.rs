use std::sync::{Arc, Mutex, MutexGuard};

use jave_core::{ProjectId, PromptId, Snapshot};
use jave_storage::{Mirror, SqliteMirror};
use tracing::{debug, info, warn};

use crate::entity::{Collection, Entity};
use crate::error::EngineError;
use crate::fields::Kind;
use crate::project::{Project, ProjectKind};
use crate::prompt::{Prompt, PromptKind};

struct Inner {
    snapshot: Mutex<Snapshot>,
    mirror: Arc<dyn Mirror>,
}

/// The in-memory entity cache and its durable mirror.
///
/// Cheap to clone; clones share the same snapshot. The snapshot lock is
/// never held across an await, so concurrent call chains interleave freely
/// and only ever observe whole mutations.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.lock();
        f.debug_struct("EntityStore")
            .field("projects", &snapshot.project.len())
            .field("prompts", &snapshot.prompt.len())
            .finish()
    }
}

impl EntityStore {
    pub fn new(snapshot: Snapshot, mirror: Arc<dyn Mirror>) -> Self {
        Self {
            inner: Arc::new(Inner {
                snapshot: Mutex::new(snapshot),
                mirror,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entity<K: Kind>(&self, id: K::Id) -> Entity<K> {
        Entity::attached(self.clone(), id)
    }

    pub fn collection<K: Kind>(&self) -> Collection<K> {
        Collection::new(self.clone())
    }

    pub fn project(&self, id: ProjectId) -> Project {
        self.entity::<ProjectKind>(id)
    }

    pub fn projects(&self) -> Collection<ProjectKind> {
        self.collection()
    }

    pub fn prompt(&self, id: PromptId) -> Prompt {
        self.entity::<PromptKind>(id)
    }

    pub fn prompts(&self) -> Collection<PromptKind> {
        self.collection()
    }

    /// Whether `(kind, id)` has a record, without registering one.
    pub fn contains<K: Kind>(&self, id: K::Id) -> bool {
        K::records(&self.lock()).contains_key(&id)
    }

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Writes the whole snapshot to the mirror.
    ///
    /// The document is captured before the first suspension point; when two
    /// persists race, whichever the mirror completes last wins.
    pub async fn persist(&self) -> Result<(), EngineError> {
        let document = self.lock().to_json()?;
        debug!("persist issued");
        self.inner.mirror.store(&document).await?;
        Ok(())
    }

    /// Drops every cached record and clears the mirror.
    pub async fn reset(&self) -> Result<(), EngineError> {
        *self.lock() = Snapshot::new();
        self.inner.mirror.clear().await?;
        info!("cleared local state");
        Ok(())
    }
}

/// Builds a store from whatever the mirror holds.
///
/// A mirror that cannot be read, or holds a document that does not parse,
/// starts the store empty as on a first run.
pub async fn load(mirror: Arc<dyn Mirror>) -> EntityStore {
    let snapshot = match mirror.load().await {
        Ok(Some(document)) => match Snapshot::from_json(document) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "discarding unreadable state");
                Snapshot::new()
            }
        },
        Ok(None) => Snapshot::new(),
        Err(e) => {
            warn!(error = %e, "failed to load state");
            Snapshot::new()
        }
    };
    debug!(
        projects = snapshot.project.len(),
        prompts = snapshot.prompt.len(),
        "loaded state"
    );
    EntityStore::new(snapshot, mirror)
}

/// Opens the SQLite mirror at `path` and loads a store from it.
///
/// Failing to open the mirror is an error; failing to read it is not.
pub async fn open(path: &str) -> Result<EntityStore, EngineError> {
    let mirror = SqliteMirror::open(path)?;
    Ok(load(Arc::new(mirror)).await)
}
