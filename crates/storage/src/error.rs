use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open mirror at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("mirror is blocked: found schema version {found}, this build supports {supported}")]
    Blocked { found: i32, supported: i32 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("mirror unavailable: {0}")]
    Unavailable(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("core error: {0}")]
    Core(#[from] jave_core::CoreError),
}

impl StorageError {
    /// True for failures that prevent the mirror from being used at all,
    /// as opposed to a single read or write going wrong.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Blocked { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
