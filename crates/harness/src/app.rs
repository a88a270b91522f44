use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use jave_client::{Client, ClientConfig, ClientError};
use tempfile::TempDir;

use crate::backend::MockBackend;

/// A reported failure as the error handler saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reported {
    pub reason: &'static str,
    pub message: String,
}

type Log = Arc<Mutex<Vec<Reported>>>;

/// A client over an on-disk mirror, talking to a [`MockBackend`], with
/// every reported failure recorded.
pub struct TestApp {
    pub backend: MockBackend,
    pub client: Client,
    config: ClientConfig,
    dir: TempDir,
    reported: Log,
}

fn record_errors(client: &Client, log: &Log) {
    let log = Arc::clone(log);
    client.set_error_handler(move |e: &ClientError| {
        log.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Reported {
                reason: e.reason(),
                message: e.to_string(),
            });
    });
}

impl TestApp {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        crate::init_tracing();
        let backend = MockBackend::start().await?;
        let config = ClientConfig::new(backend.page_url()?);
        let dir = tempfile::tempdir()?;
        let reported = Log::default();
        let client = Client::open(&config, &Self::path_in(&dir)?).await?;
        record_errors(&client, &reported);
        Ok(Self {
            backend,
            client,
            config,
            dir,
            reported,
        })
    }

    fn path_in(dir: &TempDir) -> Result<String, Box<dyn std::error::Error>> {
        let path: PathBuf = dir.path().join("state.db");
        Ok(path.to_str().ok_or("non-utf8 temp path")?.to_string())
    }

    pub fn db_path(&self) -> Result<String, Box<dyn std::error::Error>> {
        Self::path_in(&self.dir)
    }

    /// Replaces the client with a fresh one loaded from the same mirror,
    /// as a page reload would.
    pub async fn reload(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let client = Client::open(&self.config, &self.db_path()?).await?;
        record_errors(&client, &self.reported);
        self.client = client;
        Ok(())
    }

    pub fn reported(&self) -> Vec<Reported> {
        self.reported
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
