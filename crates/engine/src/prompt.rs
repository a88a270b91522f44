use std::collections::BTreeMap;

use jave_core::{FieldValue, ImageId, ProjectId, PromptId, Record, Snapshot};

use crate::entity::Entity;
use crate::fields::{accessors, Field, Kind};

pub struct PromptKind;

pub type Prompt = Entity<PromptKind>;

impl Kind for PromptKind {
    const NAME: &'static str = "prompt";
    const FIELDS: &'static [Field] = &[
        Field::scalar("id", "id"),
        Field::computed("completed"),
        Field::local("images"),
        Field::local("progress"),
        Field::scalar("project", "project"),
        Field::scalar("text", "text"),
    ];

    type Id = PromptId;

    fn records(snapshot: &Snapshot) -> &BTreeMap<PromptId, Record> {
        &snapshot.prompt
    }

    fn records_mut(snapshot: &mut Snapshot) -> &mut BTreeMap<PromptId, Record> {
        &mut snapshot.prompt
    }

    fn compute(name: &str, record: &Record) -> Option<FieldValue> {
        match name {
            "completed" => Some(FieldValue::Boolean(
                record
                    .get("progress")
                    .and_then(FieldValue::as_float)
                    .is_some_and(|p| p >= 1.0),
            )),
            _ => None,
        }
    }
}

accessors!(PromptKind {
    "project" => project, set_project, with_project: ProjectId;
    "text" => text, set_text, with_text: String;
    "progress" => progress, set_progress, with_progress: f64;
    "images" => images, set_images, with_images: Vec<ImageId>;
});

impl Prompt {
    /// Whether generation has finished; always false for a draft.
    pub fn completed(&self) -> bool {
        self.field::<bool>("completed").unwrap_or(false)
    }

    /// Appends `image` to the cached image list unless already present.
    pub fn push_image(&self, image: ImageId) {
        let mut images = self.images().unwrap_or_default();
        if !images.contains(&image) {
            images.push(image);
            self.set_images(images);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStore;
    use jave_storage::MemoryMirror;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> EntityStore {
        EntityStore::new(Snapshot::new(), Arc::new(MemoryMirror::new()))
    }

    #[test]
    fn completed_follows_progress() {
        let store = store();
        let prompt = store.prompt(PromptId::new());
        assert!(!prompt.completed());
        prompt.set_progress(0.99);
        assert!(!prompt.completed());
        prompt.set_progress(1.0);
        assert!(prompt.completed());
        assert_eq!(prompt.get("completed"), Some(FieldValue::Boolean(true)));
    }

    #[test]
    fn completed_is_read_only() {
        let store = store();
        let prompt = store.prompt(PromptId::new());
        prompt.set("completed", true);
        assert!(!prompt.completed());
    }

    #[test]
    fn local_fields_never_reach_the_wire() {
        let store = store();
        let project = ProjectId::new();
        let prompt = store
            .prompt(PromptId::new())
            .with_text("a cat".into())
            .with_project(project)
            .with_progress(0.5)
            .with_images(vec![ImageId::new()]);
        let json = prompt.json();
        assert_eq!(json["text"], json!("a cat"));
        assert_eq!(json["project"], json!(project.to_string()));
        assert!(json.get("progress").is_none());
        assert!(json.get("images").is_none());
        assert!(json.get("completed").is_none());

        prompt.update(&json!({"progress": 0.0, "images": []}));
        assert_eq!(prompt.progress(), Some(0.5));
        assert_eq!(prompt.images().map(|i| i.len()), Some(1));
    }

    #[test]
    fn push_image_is_deduplicated() {
        let store = store();
        let prompt = store.prompt(PromptId::new());
        let image = ImageId::new();
        prompt.push_image(image);
        prompt.push_image(image);
        assert_eq!(prompt.images(), Some(vec![image]));
    }

    #[test]
    fn draft_has_no_completion() {
        let store = store();
        let draft = store.prompts().empty().with_progress(1.0);
        assert!(!draft.completed());
        assert_eq!(draft.progress(), Some(1.0));
    }

    #[test]
    fn referenced_prompt_does_not_exist_until_filled() {
        let store = store();
        let prompt = store.prompt(PromptId::new());
        assert!(!prompt.exists());
        prompt.update(&json!({"text": "now it does"}));
        assert!(prompt.exists());
    }

    #[test]
    fn local_fields_alone_do_not_make_a_prompt_exist() {
        let store = store();
        let prompt = store.prompt(PromptId::new());
        prompt.set_images(vec![ImageId::new()]);
        prompt.set_progress(0.5);
        assert!(!prompt.exists());
        prompt.set_text("a cat".into());
        assert!(prompt.exists());
    }
}
