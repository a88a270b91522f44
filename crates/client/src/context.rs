use std::sync::{Arc, RwLock};

use tracing::error;

use crate::error::ClientError;

/// Receives every failure the client does not recover from.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &ClientError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&ClientError) + Send + Sync,
{
    fn handle(&self, error: &ClientError) {
        self(error)
    }
}

/// The initial handler: logs and moves on.
pub struct LogErrors;

impl ErrorHandler for LogErrors {
    fn handle(&self, e: &ClientError) {
        error!(reason = e.reason(), error = %e, "unhandled client error");
    }
}

/// The replaceable, shared destination for unrecovered failures.
#[derive(Clone)]
pub struct ErrorSink {
    handler: Arc<RwLock<Arc<dyn ErrorHandler>>>,
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self {
            handler: Arc::new(RwLock::new(Arc::new(LogErrors))),
        }
    }
}

impl ErrorSink {
    /// Swaps the handler for every holder of this sink.
    pub fn set_handler(&self, handler: impl ErrorHandler + 'static) {
        *self
            .handler
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(handler);
    }

    pub fn deliver(&self, error: &ClientError) {
        let handler = Arc::clone(
            &self
                .handler
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        handler.handle(error);
    }
}

/// State shared by every operation of one client: where failures go and
/// which locale requests ask for.
#[derive(Clone, Default)]
pub struct Context {
    errors: ErrorSink,
    locale: Option<String>,
}

impl Context {
    pub fn new(locale: Option<String>) -> Self {
        Self {
            errors: ErrorSink::default(),
            locale,
        }
    }

    pub fn errors(&self) -> &ErrorSink {
        &self.errors
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }
}
