use std::collections::BTreeMap;

use jave_core::{ProjectId, PromptId, Record, Snapshot};

use crate::entity::{Collection, Entity};
use crate::fields::{accessors, Field, Kind};
use crate::prompt::Prompt;

pub struct ProjectKind;

pub type Project = Entity<ProjectKind>;

impl Kind for ProjectKind {
    const NAME: &'static str = "project";
    const FIELDS: &'static [Field] = &[
        Field::scalar("id", "id"),
        Field::scalar("description", "description"),
        Field::scalar("imageHeight", "image_height"),
        Field::scalar("imageWidth", "image_width"),
        Field::scalar("name", "name"),
        Field::relational("prompts"),
    ];

    type Id = ProjectId;

    fn records(snapshot: &Snapshot) -> &BTreeMap<ProjectId, Record> {
        &snapshot.project
    }

    fn records_mut(snapshot: &mut Snapshot) -> &mut BTreeMap<ProjectId, Record> {
        &mut snapshot.project
    }
}

accessors!(ProjectKind {
    "name" => name, set_name, with_name: String;
    "description" => description, set_description, with_description: String;
    "imageWidth" => image_width, set_image_width, with_image_width: i64;
    "imageHeight" => image_height, set_image_height, with_image_height: i64;
});

impl Project {
    /// The ids in the `prompts` relation, in stored order.
    pub fn prompt_ids(&self) -> Vec<PromptId> {
        self.field::<Vec<PromptId>>("prompts").unwrap_or_default()
    }

    /// The prompts of this project; always empty for a draft.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompt_ids()
            .into_iter()
            .map(|id| self.store.prompt(id))
            .collect()
    }

    /// Replaces the relation with the ids of `prompts`.
    pub fn set_prompts(&self, prompts: &[Prompt]) {
        let ids: Vec<PromptId> = prompts.iter().filter_map(Prompt::id).collect();
        self.set("prompts", ids);
    }

    pub fn with_prompts(self, prompts: &[Prompt]) -> Self {
        self.set_prompts(prompts);
        self
    }
}

impl Collection<ProjectKind> {
    /// Drops every cached project whose id is not in `ids`.
    pub fn filter(&self, ids: &[ProjectId]) {
        self.store
            .lock()
            .project
            .retain(|id, _| ids.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStore;
    use jave_core::FieldValue;
    use jave_storage::MemoryMirror;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> (EntityStore, MemoryMirror) {
        let mirror = MemoryMirror::new();
        (
            EntityStore::new(Snapshot::new(), Arc::new(mirror.clone())),
            mirror,
        )
    }

    #[test]
    fn builder_sets_and_serializes_scalars() {
        let (store, _) = store();
        let draft = store
            .projects()
            .empty()
            .with_name("Cats".into())
            .with_description(String::new())
            .with_image_width(512)
            .with_image_height(768);

        assert_eq!(draft.name().as_deref(), Some("Cats"));
        assert_eq!(draft.image_width(), Some(512));
        assert_eq!(
            draft.json(),
            json!({"name": "Cats", "description": "", "image_width": 512, "image_height": 768})
        );
        assert!(draft.is_detached());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn every_scalar_round_trips_through_json() {
        let (store, _) = store();
        let project = store.project(ProjectId::new());
        for field in ProjectKind::FIELDS {
            let Some(backend) = ProjectKind::backend_of(field.name) else {
                continue;
            };
            if field.name == "id" {
                continue;
            }
            let value = FieldValue::Text(format!("v-{}", field.name));
            project.set(field.name, value.clone());
            assert_eq!(project.get(field.name), Some(value.clone()));
            assert_eq!(project.json()[backend], value.to_json());
        }
    }

    #[test]
    fn update_renames_and_drops_unknown() {
        let (store, _) = store();
        let id = ProjectId::new();
        let project = store.project(id);
        project.update(&json!({
            "name": "Dogs",
            "image_width": 256,
            "shiny_new_field": true,
            "prompts": ["ignored"],
        }));
        assert_eq!(project.name().as_deref(), Some("Dogs"));
        assert_eq!(project.image_width(), Some(256));
        assert!(project.prompt_ids().is_empty());
        let record = &store.snapshot().project[&id];
        assert!(record.contains_key("imageWidth"));
        assert!(!record.contains_key("image_width"));
        assert!(!record.contains_key("shiny_new_field"));
    }

    #[test]
    fn update_is_idempotent_and_keeps_unspecified_fields() {
        let (store, _) = store();
        let project = store.project(ProjectId::new());
        project.set_description("kept".into());
        let payload = json!({"name": "Birds", "image_height": 128});
        project.update(&payload);
        let once = store.snapshot();
        project.update(&payload);
        assert_eq!(store.snapshot(), once);
        assert_eq!(project.description().as_deref(), Some("kept"));
    }

    #[test]
    fn prompts_relation_resolves_entities() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _) = store();
        let project = store.project(ProjectId::new());
        let a = store.prompts().create(&json!({"id": PromptId::new().to_string(), "text": "a"}))?;
        let b = store.prompts().create(&json!({"id": PromptId::new().to_string(), "text": "b"}))?;
        project.set_prompts(&[a.clone(), b.clone()]);

        let texts: Vec<_> = project.prompts().iter().filter_map(|p| p.text()).collect();
        assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
        assert!(!project.json().as_object().is_some_and(|o| o.contains_key("prompts")));
        Ok(())
    }

    #[test]
    fn relation_alone_does_not_make_a_project_exist() {
        let (store, _) = store();
        let project = store.project(ProjectId::new());
        project.set_prompts(&[store.prompt(PromptId::new())]);
        assert!(!project.exists());
        assert!(store.projects().all().is_empty());
        project.set_name("Cats".into());
        assert!(project.exists());
    }

    #[test]
    fn drafts_have_no_relations() {
        let (store, _) = store();
        let draft = store.projects().empty();
        let prompt = store.prompt(PromptId::new());
        draft.set_prompts(&[prompt]);
        assert!(draft.prompts().is_empty());
        assert_eq!(draft.get("prompts"), None);
    }

    #[test]
    fn filter_prunes_missing_projects() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _) = store();
        let [a, b, c] = [ProjectId::new(), ProjectId::new(), ProjectId::new()];
        for id in [a, b, c] {
            store.projects().create(&json!({"id": id.to_string(), "name": "p"}))?;
        }
        store.projects().filter(&[a, b]);
        assert!(store.contains::<ProjectKind>(a));
        assert!(store.contains::<ProjectKind>(b));
        assert!(!store.contains::<ProjectKind>(c));
        assert_eq!(store.projects().all().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn store_persists_under_project_id() -> Result<(), Box<dyn std::error::Error>> {
        let (store, mirror) = store();
        let id = ProjectId::new();
        store
            .projects()
            .create(&json!({
                "id": id.to_string(),
                "name": "Cats",
                "description": "",
                "image_width": 512,
                "image_height": 512,
            }))?
            .store()
            .await?;
        let document = mirror.document().ok_or("nothing stored")?;
        assert_eq!(document["project"][id.to_string()]["name"], json!("Cats"));
        assert_eq!(document["project"][id.to_string()]["imageWidth"], json!(512));
        Ok(())
    }

    #[tokio::test]
    async fn remove_deletes_and_persists() -> Result<(), Box<dyn std::error::Error>> {
        let (store, mirror) = store();
        let id = ProjectId::new();
        let project = store.projects().create(&json!({"id": id.to_string(), "name": "x"}))?;
        project.store().await?;
        project.remove().await?;
        assert!(!store.contains::<ProjectKind>(id));
        assert_eq!(mirror.store_count(), 2);
        assert_eq!(mirror.document(), Some(json!({})));

        project.set_name("ghost".into());
        assert!(!store.contains::<ProjectKind>(id));
        Ok(())
    }

    #[tokio::test]
    async fn drafts_cannot_be_stored() {
        let (store, _) = store();
        let draft = store.projects().empty();
        assert!(draft.store().await.is_err());
        assert!(draft.remove().await.is_err());
    }

    #[test]
    fn to_draft_copies_scalars_without_id() {
        let (store, _) = store();
        let project = store
            .project(ProjectId::new())
            .with_name("Source".into())
            .with_image_width(64);
        let copy = project.to_draft();
        assert!(copy.is_detached());
        assert_eq!(copy.id(), None);
        assert_eq!(copy.json(), json!({"name": "Source", "image_width": 64}));
    }
}
