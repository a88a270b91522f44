use jave_core::CoreError;
use jave_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("{0} record has no id")]
    MissingId(&'static str),

    #[error("detached {0} cannot be stored or removed")]
    Detached(&'static str),
}
