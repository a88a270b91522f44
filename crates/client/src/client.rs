use jave_core::{ImageId, ProjectId};
use jave_engine::EntityStore;
use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::context::{Context, ErrorHandler};
use crate::error::ClientError;
use crate::project::ProjectApi;
use crate::prompt::PromptApi;
use crate::request::{self, Body};

/// Remote operations against the backend, folded into a local entity store.
///
/// Cheap to clone; clones share the store and the error sink.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base: Url,
    store: EntityStore,
    context: Context,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base", &self.base.as_str())
            .field("store", &self.store)
            .finish()
    }
}

impl Client {
    pub fn new(config: &ClientConfig, store: EntityStore) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base: config.base_url()?,
            store,
            context: Context::new(config.locale.clone()),
        })
    }

    /// Opens the mirror at `path`, loads the cached state and builds a
    /// client over it. A mirror that cannot be opened fails startup.
    pub async fn open(config: &ClientConfig, path: &str) -> Result<Self, ClientError> {
        let store = jave_engine::open(path).await?;
        info!(base = %config.base_url()?, "client ready");
        Self::new(config, store)
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Replaces the handler that receives every unrecovered failure.
    pub fn set_error_handler(&self, handler: impl ErrorHandler + 'static) {
        self.context.errors().set_handler(handler);
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn project(&self) -> ProjectApi<'_> {
        ProjectApi::new(self)
    }

    pub fn prompt(&self) -> PromptApi<'_> {
        PromptApi::new(self)
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    /// The push channel for a project: the API location with a WebSocket
    /// scheme.
    pub fn notification_url(&self, project: ProjectId) -> Result<Url, ClientError> {
        let mut url = self.endpoint(&format!("project/{project}/notifications"))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| {
                ClientError::Config(format!("cannot derive push url from {}", self.base))
            })?;
        Ok(url)
    }

    pub fn image_url(&self, image: ImageId) -> Result<Url, ClientError> {
        self.endpoint(&format!("image/{image}/png"))
    }

    pub(crate) async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Body, ClientError> {
        let url = self.endpoint(path)?;
        request::send(&self.http, &self.context, method, url, body).await
    }

    /// Hands `error` to the error sink and gives it back.
    pub(crate) fn report(&self, error: ClientError) -> ClientError {
        self.context.errors().deliver(&error);
        error
    }

    /// Settles an operation that must never pretend to succeed.
    pub(crate) fn fail_loudly<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        result.map_err(|e| self.report(e))
    }

    /// Settles a read: a connection failure is answered from the cache when
    /// `fallback` can derive the result, anything else is reported.
    pub(crate) fn degrade<T>(
        &self,
        result: Result<T, ClientError>,
        fallback: impl FnOnce() -> Option<T>,
    ) -> Result<T, ClientError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_connection() => match fallback() {
                Some(value) => {
                    warn!(error = %e, "fallback taken");
                    Ok(value)
                }
                None => Err(self.report(e)),
            },
            Err(e) => Err(self.report(e)),
        }
    }
}
