use jave_core::{ImageEvent, Notification, ProjectId, PromptId};
use jave_engine::ProjectKind;
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

use crate::client::Client;
use crate::error::ClientError;

/// What the user is looking at, and so which prompts get continued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watch {
    /// Every cached prompt of the project is displayed.
    Project(ProjectId),
    Prompt { project: ProjectId, prompt: PromptId },
}

impl Watch {
    pub fn project(&self) -> ProjectId {
        match self {
            Watch::Project(id) | Watch::Prompt { project: id, .. } => *id,
        }
    }
}

/// Applies push messages for one watched resource and drives generation
/// forward: the server only reports, the client submits the next step.
pub struct NotificationMerge {
    client: Client,
    watch: Watch,
}

impl NotificationMerge {
    pub fn new(client: Client, watch: Watch) -> Self {
        Self { client, watch }
    }

    pub fn watch(&self) -> Watch {
        self.watch
    }

    /// Where the push channel for the watched resource lives.
    pub fn url(&self) -> Result<Url, ClientError> {
        self.client.notification_url(self.watch.project())
    }

    pub fn displayed(&self) -> Vec<PromptId> {
        match self.watch {
            Watch::Project(id) => {
                let store = self.client.store();
                if store.contains::<ProjectKind>(id) {
                    store.project(id).prompt_ids()
                } else {
                    Vec::new()
                }
            }
            Watch::Prompt { prompt, .. } => vec![prompt],
        }
    }

    /// Handles one raw message and returns the prompts it continued.
    ///
    /// Never fails: every problem goes to the error sink so the next
    /// message is still handled.
    pub async fn deliver(&self, raw: &str) -> Vec<PromptId> {
        let notification = match Notification::parse(raw) {
            Ok(n) => n,
            Err(e) => {
                self.client.report(e.into());
                return Vec::new();
            }
        };
        debug!(image = ?notification.image, "notification received");

        if let Err(e) = self.client.store().apply(&notification).await {
            self.client.report(e.into());
        }

        let targets = match &notification.image {
            Some(ImageEvent::Idle) => self.displayed(),
            Some(ImageEvent::Completed(c)) if self.displayed().contains(&c.prompt_id) => {
                vec![c.prompt_id]
            }
            _ => Vec::new(),
        };
        for id in &targets {
            // Failures are already reported by the operation itself.
            let _ = self.client.prompt().generate_next(*id).await;
        }
        targets
    }

    /// Handles messages in receipt order until the channel closes.
    pub async fn run(&self, mut messages: mpsc::Receiver<String>) {
        info!(watch = ?self.watch, "notification merge started");
        while let Some(raw) = messages.recv().await {
            self.deliver(&raw).await;
        }
        info!(watch = ?self.watch, "notification merge stopped");
    }
}
