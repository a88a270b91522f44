pub mod entity;
pub mod error;
pub mod fields;
pub mod notify;
pub mod project;
pub mod prompt;
pub mod store;

pub use entity::{Collection, Entity};
pub use error::EngineError;
pub use fields::{Field, FieldKind, Kind};
pub use project::{Project, ProjectKind};
pub use prompt::{Prompt, PromptKind};
pub use store::{load, open, EntityStore};
