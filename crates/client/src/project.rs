use jave_core::ProjectId;
use jave_engine::{Project, ProjectKind, Prompt};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::client::Client;
use crate::error::ClientError;
use crate::fallback::Fallback;

/// Project operations. Reads degrade to the cache, writes fail loudly.
pub struct ProjectApi<'a> {
    client: &'a Client,
}

/// `PUT` bodies never carry the id; it is in the path.
pub(crate) fn without_id(mut payload: Value) -> Value {
    if let Some(fields) = payload.as_object_mut() {
        fields.remove("id");
    }
    payload
}

/// Lower-cases and collapses whitespace, for comparing names as a user
/// would.
fn normalize(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl<'a> ProjectApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Creates a project from a draft and caches the server's record.
    pub async fn create(&self, draft: &Project) -> Result<Project, ClientError> {
        let result: Result<Project, ClientError> = async {
            let record = self
                .client
                .request(Method::POST, "project", Some(&without_id(draft.json())))
                .await?
                .into_json()?;
            let project = self.client.store().projects().create(&record)?;
            Ok(project.store().await?)
        }
        .await;
        self.client.fail_loudly(result)
    }

    pub async fn get(&self, id: ProjectId) -> Result<Project, ClientError> {
        let store = self.client.store();
        let result: Result<Project, ClientError> = async {
            let record = self
                .client
                .request(Method::GET, &format!("project/{id}"), None)
                .await?
                .into_json()?;
            let project = store.project(id);
            project.update(&record);
            Ok(project.store().await?)
        }
        .await;
        self.client.degrade(result, || {
            Fallback::seed(id).then(|id| Ok(store.project(id))).finish()
        })
    }

    /// Sends the scalar fields of `draft` as the new state of project `id`.
    pub async fn update(&self, id: ProjectId, draft: &Project) -> Result<Project, ClientError> {
        let result: Result<Project, ClientError> = async {
            let record = self
                .client
                .request(
                    Method::PUT,
                    &format!("project/{id}"),
                    Some(&without_id(draft.json())),
                )
                .await?
                .into_json()?;
            let project = self.client.store().project(id);
            project.update(&record);
            Ok(project.store().await?)
        }
        .await;
        self.client.fail_loudly(result)
    }

    pub async fn remove(&self, id: ProjectId) -> Result<(), ClientError> {
        let result: Result<(), ClientError> = async {
            self.client
                .request(Method::DELETE, &format!("project/{id}"), None)
                .await?;
            Ok(self.client.store().project(id).remove().await?)
        }
        .await;
        self.client.fail_loudly(result)
    }

    /// Lists every project, pruning cached projects the server no longer
    /// has.
    pub async fn all(&self) -> Result<Vec<Project>, ClientError> {
        let store = self.client.store();
        let result: Result<Vec<Project>, ClientError> = async {
            let records = self
                .client
                .request(Method::GET, "project", None)
                .await?
                .into_list()?;
            let projects = records
                .iter()
                .map(|record| store.projects().create(record))
                .collect::<Result<Vec<_>, _>>()?;
            let ids: Vec<ProjectId> = projects.iter().filter_map(Project::id).collect();
            store.projects().filter(&ids);
            store.persist().await?;
            Ok(projects)
        }
        .await;
        self.client.degrade(result, || {
            Fallback::seed(())
                .then(|()| Ok(store.projects().all()))
                .finish()
        })
    }

    /// The prompts of project `id`, in server order. A cached project's
    /// relation is replaced by exactly the returned ids.
    pub async fn prompts(&self, id: ProjectId) -> Result<Vec<Prompt>, ClientError> {
        let store = self.client.store();
        let result: Result<Vec<Prompt>, ClientError> = async {
            let records = self
                .client
                .request(Method::GET, &format!("project/{id}/prompts"), None)
                .await?
                .into_list()?;
            let prompts = records
                .iter()
                .map(|record| store.prompts().create(record))
                .collect::<Result<Vec<_>, _>>()?;
            if store.contains::<ProjectKind>(id) {
                store.project(id).set_prompts(&prompts);
            }
            store.persist().await?;
            Ok(prompts)
        }
        .await;
        self.client.degrade(result, || {
            Fallback::seed(id)
                .then(|id| Ok(store.project(id)))
                .then(|project| Ok(project.prompts()))
                .finish()
        })
    }

    /// Projects whose name matches `name`, ignoring case and spacing.
    pub async fn find_named(&self, name: &str) -> Result<Vec<Project>, ClientError> {
        let wanted = normalize(name);
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|p| p.name().is_some_and(|n| normalize(&n) == wanted))
            .collect())
    }

    pub fn icon_url(&self, id: ProjectId) -> Result<Url, ClientError> {
        self.client.endpoint(&format!("project/{id}/icon"))
    }
}
