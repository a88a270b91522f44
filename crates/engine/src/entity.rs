use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use jave_core::{FieldValue, FromField, Record};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::fields::{FieldKind, Kind};
use crate::store::EntityStore;

enum Slot<I> {
    Attached(I),
    Detached(Arc<Mutex<Record>>),
}

impl<I: Copy> Clone for Slot<I> {
    fn clone(&self) -> Self {
        match self {
            Self::Attached(id) => Self::Attached(*id),
            Self::Detached(record) => Self::Detached(Arc::clone(record)),
        }
    }
}

/// A live handle on one cached record.
///
/// An attached entity reads and writes the record held in the store's
/// snapshot under its id, so every handle on the same `(kind, id)` sees the
/// same data. A detached entity owns a private draft record and exists only
/// to build request payloads.
pub struct Entity<K: Kind> {
    pub(crate) store: EntityStore,
    slot: Slot<K::Id>,
    _kind: PhantomData<K>,
}

impl<K: Kind> Clone for Entity<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            slot: self.slot.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: Kind> fmt::Debug for Entity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            Slot::Attached(id) => write!(f, "{}({id})", K::NAME),
            Slot::Detached(_) => write!(f, "{}(draft)", K::NAME),
        }
    }
}

fn lock_record(record: &Mutex<Record>) -> MutexGuard<'_, Record> {
    record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K: Kind> Entity<K> {
    /// Returns the entity for `id`, registering a bare `{id}` record when
    /// the store has none yet.
    pub(crate) fn attached(store: EntityStore, id: K::Id) -> Self {
        K::records_mut(&mut store.lock())
            .entry(id)
            .or_insert_with(|| Record::from([("id".to_string(), id.into())]));
        Self {
            store,
            slot: Slot::Attached(id),
            _kind: PhantomData,
        }
    }

    pub(crate) fn detached(store: EntityStore, record: Record) -> Self {
        Self {
            store,
            slot: Slot::Detached(Arc::new(Mutex::new(record))),
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> Option<K::Id> {
        match &self.slot {
            Slot::Attached(id) => Some(*id),
            Slot::Detached(record) => lock_record(record)
                .get("id")
                .and_then(<K::Id as FromField>::from_field),
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.slot, Slot::Detached(_))
    }

    /// Whether the store holds data received from the backend for this
    /// entity.
    ///
    /// Only backend fields other than the id count: a record that was
    /// merely referenced, or holds nothing but relations and local fields,
    /// was never received.
    pub fn exists(&self) -> bool {
        match &self.slot {
            Slot::Attached(_) => self.read(|record| {
                record.is_some_and(|r| {
                    r.keys()
                        .any(|k| k != "id" && K::backend_of(k).is_some())
                })
            }),
            Slot::Detached(_) => false,
        }
    }

    fn read<R>(&self, f: impl FnOnce(Option<&Record>) -> R) -> R {
        match &self.slot {
            Slot::Attached(id) => f(K::records(&self.store.lock()).get(id)),
            Slot::Detached(record) => f(Some(&lock_record(record))),
        }
    }

    /// Writes go nowhere once the record has been removed from the store;
    /// a stale handle never resurrects a pruned entity.
    fn write(&self, f: impl FnOnce(&mut Record)) {
        match &self.slot {
            Slot::Attached(id) => {
                if let Some(record) = K::records_mut(&mut self.store.lock()).get_mut(id) {
                    f(record);
                }
            }
            Slot::Detached(record) => f(&mut lock_record(record)),
        }
    }

    /// Reads a field by its frontend name.
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        let field = K::field(name)?;
        match field.kind {
            FieldKind::Scalar { .. } | FieldKind::Local => {
                self.read(|r| r.and_then(|r| r.get(name).cloned()))
            }
            FieldKind::Computed | FieldKind::Relational if self.is_detached() => None,
            FieldKind::Computed => self.read(|r| r.and_then(|r| K::compute(name, r))),
            FieldKind::Relational => self.read(|r| r.and_then(|r| r.get(name).cloned())),
        }
    }

    pub(crate) fn field<T: FromField>(&self, name: &str) -> Option<T> {
        self.get(name).as_ref().and_then(T::from_field)
    }

    /// Writes a field by its frontend name.
    ///
    /// Computed fields are read-only, and relational fields need a stable
    /// id; writes to either are ignored on entities that cannot take them.
    pub fn set(&self, name: &str, value: impl Into<FieldValue>) -> &Self {
        match K::field(name).map(|f| f.kind) {
            Some(FieldKind::Scalar { .. } | FieldKind::Local) => {
                let value = value.into();
                self.write(|r| {
                    r.insert(name.to_string(), value);
                });
            }
            Some(FieldKind::Relational) if !self.is_detached() => {
                let value = value.into();
                self.write(|r| {
                    r.insert(name.to_string(), value);
                });
            }
            Some(_) => debug!(kind = K::NAME, field = name, "ignored write"),
            None => warn!(kind = K::NAME, field = name, "write to unknown field"),
        }
        self
    }

    /// Merges a backend record into this entity.
    ///
    /// Only backend fields with a scalar mapping are taken; anything else the
    /// server sends is dropped, and fields absent from `payload` keep their
    /// cached values.
    pub fn update(&self, payload: &Value) -> &Self {
        let Some(fields) = payload.as_object() else {
            return self;
        };
        let incoming: Vec<(&'static str, FieldValue)> = fields
            .iter()
            .filter_map(|(backend, value)| {
                Some((K::front_of(backend)?, FieldValue::from_json(value)?))
            })
            .collect();
        self.write(|r| {
            for (name, value) in incoming {
                r.insert(name.to_string(), value);
            }
        });
        self
    }

    /// Serializes the scalar fields under their backend names.
    pub fn json(&self) -> Value {
        self.read(|record| {
            let mut out = Map::new();
            if let Some(record) = record {
                for field in K::FIELDS {
                    if let FieldKind::Scalar { backend } = field.kind {
                        if let Some(value) = record.get(field.name) {
                            out.insert(backend.to_string(), value.to_json());
                        }
                    }
                }
            }
            Value::Object(out)
        })
    }

    /// A detached copy of the scalar fields, without the id.
    pub fn to_draft(&self) -> Self {
        let record = self.read(|record| {
            record
                .map(|r| {
                    r.iter()
                        .filter(|(name, _)| {
                            name.as_str() != "id" && K::backend_of(name).is_some()
                        })
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default()
        });
        Self::detached(self.store.clone(), record)
    }

    /// Persists the whole snapshot.
    pub async fn store(&self) -> Result<Self, EngineError> {
        if self.is_detached() {
            return Err(EngineError::Detached(K::NAME));
        }
        self.store.persist().await?;
        Ok(self.clone())
    }

    /// Deletes the record, then persists the whole snapshot.
    pub async fn remove(&self) -> Result<(), EngineError> {
        let Slot::Attached(id) = &self.slot else {
            return Err(EngineError::Detached(K::NAME));
        };
        K::records_mut(&mut self.store.lock()).remove(id);
        self.store.persist().await
    }
}

/// Operations on all entities of one kind.
pub struct Collection<K: Kind> {
    pub(crate) store: EntityStore,
    _kind: PhantomData<K>,
}

impl<K: Kind> Collection<K> {
    pub(crate) fn new(store: EntityStore) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    /// Folds a backend record into the cache and returns its entity.
    pub fn create(&self, payload: &Value) -> Result<Entity<K>, EngineError> {
        let id: K::Id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingId(K::NAME))?
            .parse()?;
        let entity = Entity::attached(self.store.clone(), id);
        entity.update(payload);
        Ok(entity)
    }

    /// A detached draft for building a create payload.
    pub fn empty(&self) -> Entity<K> {
        Entity::detached(self.store.clone(), Record::new())
    }

    /// All cached entities of this kind that exist.
    pub fn all(&self) -> Vec<Entity<K>> {
        let ids: Vec<K::Id> = K::records(&self.store.lock()).keys().copied().collect();
        ids.into_iter()
            .map(|id| Entity::attached(self.store.clone(), id))
            .filter(Entity::exists)
            .collect()
    }
}
