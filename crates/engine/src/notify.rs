use jave_core::{ImageEvent, Notification};
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;
use crate::store::EntityStore;

impl EntityStore {
    /// Folds a push message into the cache and persists it.
    ///
    /// Only `completed` carries state: the prompt record it holds is
    /// upserted, its progress recorded and the new image appended. Other
    /// messages leave the store untouched.
    pub async fn apply(&self, notification: &Notification) -> Result<(), EngineError> {
        let Some(ImageEvent::Completed(completed)) = &notification.image else {
            return Ok(());
        };
        debug!(
            prompt = %completed.prompt_id,
            progress = completed.progress,
            "applying completed event"
        );
        let prompt = self.prompt(completed.prompt_id);
        prompt.update(&Value::Object(completed.prompt.clone()));
        prompt.set_progress(completed.progress);
        if let Some(image) = completed.image {
            prompt.push_image(image);
        }
        prompt.store().await?;
        Ok(())
    }
}
