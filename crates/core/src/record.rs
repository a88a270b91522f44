use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::ids::{ProjectId, PromptId};

/// The cached fields of one entity, keyed by frontend field name.
pub type Record = BTreeMap<String, FieldValue>;

/// The whole in-memory content of the entity store.
///
/// Serialised as `{"project": {<id>: {...}}, "prompt": {<id>: {...}}}`; a
/// missing section reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub project: BTreeMap<ProjectId, Record>,
    #[serde(default)]
    pub prompt: BTreeMap<PromptId, Record>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.project.is_empty() && self.prompt.is_empty()
    }

    pub fn to_json(&self) -> Result<serde_json::Value, crate::CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, crate::CoreError> {
        Ok(serde_json::from_value(value)?)
    }
}
