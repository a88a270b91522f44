use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ids::{ImageId, PromptId};
use crate::CoreError;

/// A message received on the push channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub image: Option<ImageEvent>,
}

impl Notification {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Generation events, discriminated on `image.kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawImageEvent")]
pub enum ImageEvent {
    /// A generation slot is free.
    Idle,
    /// One unit of work finished for a prompt.
    Completed(Completed),
    /// A kind this client does not act on.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub prompt_id: PromptId,
    /// The prompt record as sent by the backend, including `id`.
    pub prompt: Map<String, Value>,
    pub progress: f64,
    pub image: Option<ImageId>,
}

#[derive(Deserialize)]
struct RawImageEvent {
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct RawCompleted {
    prompt: Map<String, Value>,
    progress: f64,
    #[serde(default)]
    image: Option<ImageId>,
}

impl TryFrom<RawImageEvent> for ImageEvent {
    type Error = CoreError;

    fn try_from(raw: RawImageEvent) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "idle" => Ok(Self::Idle),
            "completed" => {
                let data: RawCompleted = serde_json::from_value(raw.data)?;
                let prompt_id = data
                    .prompt
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CoreError::InvalidData("completed event without prompt id".into())
                    })?
                    .parse()?;
                Ok(Self::Completed(Completed {
                    prompt_id,
                    prompt: data.prompt,
                    progress: data.progress,
                    image: data.image,
                }))
            }
            _ => Ok(Self::Other(raw.kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completed_carries_prompt_and_progress() -> Result<(), Box<dyn std::error::Error>> {
        let prompt = PromptId::new();
        let image = ImageId::new();
        let raw = json!({
            "image": {
                "kind": "completed",
                "data": {
                    "prompt": { "id": prompt.to_string(), "text": "a cat" },
                    "image": image.to_string(),
                    "progress": 0.5,
                }
            }
        })
        .to_string();

        match Notification::parse(&raw)?.image {
            Some(ImageEvent::Completed(c)) => {
                assert_eq!(c.prompt_id, prompt);
                assert_eq!(c.progress, 0.5);
                assert_eq!(c.image, Some(image));
                assert_eq!(c.prompt["text"], json!("a cat"));
            }
            other => panic!("expected completed, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn idle_needs_no_data() -> Result<(), Box<dyn std::error::Error>> {
        let n = Notification::parse(r#"{"image": {"kind": "idle"}}"#)?;
        assert_eq!(n.image, Some(ImageEvent::Idle));
        Ok(())
    }

    #[test]
    fn unknown_kinds_and_other_resources_pass() -> Result<(), Box<dyn std::error::Error>> {
        let n = Notification::parse(r#"{"image": {"kind": "queued", "data": {"x": 1}}}"#)?;
        assert_eq!(n.image, Some(ImageEvent::Other("queued".into())));
        let n = Notification::parse(r#"{"project": {"kind": "idle"}}"#)?;
        assert_eq!(n.image, None);
        Ok(())
    }

    #[test]
    fn completed_without_prompt_id_is_malformed() {
        let raw = r#"{"image": {"kind": "completed", "data": {"prompt": {}, "progress": 1.0}}}"#;
        assert!(Notification::parse(raw).is_err());
    }
}
