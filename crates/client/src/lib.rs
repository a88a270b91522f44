pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod notify;
pub mod project;
pub mod prompt;
pub mod request;

pub use client::Client;
pub use config::ClientConfig;
pub use context::{Context, ErrorHandler, ErrorSink, LogErrors};
pub use error::ClientError;
pub use fallback::{Candidate, Fallback};
pub use notify::{NotificationMerge, Watch};
pub use project::ProjectApi;
pub use prompt::PromptApi;
pub use request::Body;
