use jave_core::{ImageId, ProjectId, PromptId};
use jave_engine::{ProjectKind, Prompt, PromptKind};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::client::Client;
use crate::error::ClientError;
use crate::fallback::Fallback;
use crate::project::without_id;
use crate::request::Body;

pub struct PromptApi<'a> {
    client: &'a Client,
}

/// Image listings hold either bare ids or image records.
fn image_id(item: &Value) -> Result<ImageId, ClientError> {
    let raw = match item {
        Value::String(s) => s.as_str(),
        other => other
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Decode(format!("image without id: {other}")))?,
    };
    Ok(raw.parse()?)
}

impl<'a> PromptApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Creates a prompt under `project` and appends it to the cached
    /// project's relation.
    pub async fn create(&self, project: ProjectId, draft: &Prompt) -> Result<Prompt, ClientError> {
        let store = self.client.store();
        let result: Result<Prompt, ClientError> = async {
            let mut payload = without_id(draft.json());
            if let Some(fields) = payload.as_object_mut() {
                fields.remove("project");
            }
            let record = self
                .client
                .request(
                    Method::POST,
                    &format!("project/{project}/prompts"),
                    Some(&payload),
                )
                .await?
                .into_json()?;
            let prompt = store.prompts().create(&record)?;
            if prompt.project().is_none() {
                prompt.set_project(project);
            }
            if store.contains::<ProjectKind>(project) {
                let owner = store.project(project);
                let mut prompts = owner.prompts();
                if prompts.iter().all(|p| p.id() != prompt.id()) {
                    prompts.push(prompt.clone());
                    owner.set_prompts(&prompts);
                }
            }
            Ok(prompt.store().await?)
        }
        .await;
        self.client.fail_loudly(result)
    }

    pub async fn get(&self, id: PromptId) -> Result<Prompt, ClientError> {
        let store = self.client.store();
        let result: Result<Prompt, ClientError> = async {
            let record = self
                .client
                .request(Method::GET, &format!("prompt/{id}"), None)
                .await?
                .into_json()?;
            let prompt = store.prompt(id);
            prompt.update(&record);
            Ok(prompt.store().await?)
        }
        .await;
        self.client.degrade(result, || {
            Fallback::seed(id).then(|id| Ok(store.prompt(id))).finish()
        })
    }

    /// Deletes a prompt, dropping it from its project's relation as well.
    pub async fn remove(&self, id: PromptId) -> Result<(), ClientError> {
        let store = self.client.store();
        let result: Result<(), ClientError> = async {
            self.client
                .request(Method::DELETE, &format!("prompt/{id}"), None)
                .await?;
            let prompt = store.prompt(id);
            if let Some(owner) = prompt.project().filter(|p| store.contains::<ProjectKind>(*p)) {
                let owner = store.project(owner);
                let remaining: Vec<Prompt> = owner
                    .prompts()
                    .into_iter()
                    .filter(|p| p.id() != Some(id))
                    .collect();
                owner.set_prompts(&remaining);
            }
            Ok(prompt.remove().await?)
        }
        .await;
        self.client.fail_loudly(result)
    }

    /// The image ids of prompt `id`, kept in a cached prompt's local
    /// `images`.
    pub async fn images(&self, id: PromptId) -> Result<Vec<ImageId>, ClientError> {
        let store = self.client.store();
        let result: Result<Vec<ImageId>, ClientError> = async {
            let items = self
                .client
                .request(Method::GET, &format!("prompt/{id}/images"), None)
                .await?
                .into_list()?;
            let images = items.iter().map(image_id).collect::<Result<Vec<_>, _>>()?;
            if store.contains::<PromptKind>(id) {
                let prompt = store.prompt(id);
                prompt.set_images(images.clone());
                prompt.store().await?;
            }
            Ok(images)
        }
        .await;
        self.client.degrade(result, || {
            Fallback::seed(id)
                .then(|id| Ok(store.prompt(id)))
                .then(|prompt| Ok(prompt.images().unwrap_or_default()))
                .finish()
        })
    }

    /// Asks the backend to queue the next generation step for prompt `id`.
    pub async fn generate_next(&self, id: PromptId) -> Result<Prompt, ClientError> {
        let store = self.client.store();
        let result: Result<Prompt, ClientError> = async {
            let body = self
                .client
                .request(Method::POST, &format!("prompt/{id}/generate-next"), None)
                .await?;
            let prompt = store.prompt(id);
            match body {
                Body::Json(record) if record.get("id").is_some() => {
                    prompt.update(&record);
                    Ok(prompt.store().await?)
                }
                _ => {
                    debug!(prompt = %id, "generation queued");
                    Ok(prompt)
                }
            }
        }
        .await;
        self.client.fail_loudly(result)
    }

    pub fn icon_url(&self, id: PromptId) -> Result<Url, ClientError> {
        self.client.endpoint(&format!("prompt/{id}/icon"))
    }
}
