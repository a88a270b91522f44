use jave_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No response, or a response with status 500 and above.
    #[error("connection failed: {reason}")]
    Connection { reason: String },

    /// Any other non-success response.
    #[error("request failed with status {status}: {body}")]
    Application { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether this failure may be answered from the cache.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Short label for the failure family, as shown to the user.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Application { .. } => "application",
            Self::Decode(_) | Self::Engine(EngineError::Core(_) | EngineError::MissingId(_)) => {
                "decode"
            }
            Self::Engine(_) => "storage",
            Self::Url(_) | Self::Config(_) => "config",
        }
    }
}

impl From<jave_storage::StorageError> for ClientError {
    fn from(e: jave_storage::StorageError) -> Self {
        Self::Engine(EngineError::Storage(e))
    }
}

impl From<jave_core::CoreError> for ClientError {
    fn from(e: jave_core::CoreError) -> Self {
        Self::Decode(e.to_string())
    }
}
