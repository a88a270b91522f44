use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::context::Context;
use crate::error::ClientError;

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    pub fn into_json(self) -> Result<Value, ClientError> {
        match self {
            Body::Json(value) => Ok(value),
            Body::Text(text) => Err(ClientError::Decode(format!("expected JSON, got {text:?}"))),
        }
    }

    /// The elements of a JSON array response.
    pub fn into_list(self) -> Result<Vec<Value>, ClientError> {
        match self.into_json()? {
            Value::Array(items) => Ok(items),
            other => Err(ClientError::Decode(format!("expected a list, got {other}"))),
        }
    }
}

/// Sorts a received response into a body or one of the failure families.
pub(crate) fn classify(
    status: u16,
    content_type: Option<&str>,
    text: String,
) -> Result<Body, ClientError> {
    if status >= 500 {
        return Err(ClientError::Connection {
            reason: format!("server responded with status {status}"),
        });
    }
    if !(200..300).contains(&status) {
        return Err(ClientError::Application { status, body: text });
    }
    if content_type.is_some_and(|t| t.starts_with("application/json")) {
        serde_json::from_str(&text)
            .map(Body::Json)
            .map_err(|e| ClientError::Decode(e.to_string()))
    } else {
        Ok(Body::Text(text))
    }
}

pub(crate) async fn send(
    http: &reqwest::Client,
    context: &Context,
    method: Method,
    url: Url,
    body: Option<&Value>,
) -> Result<Body, ClientError> {
    debug!(%method, %url, "request issued");
    let mut request = http.request(method.clone(), url.clone());
    if let Some(body) = body {
        request = request.json(body);
    }
    if let Some(locale) = context.locale() {
        request = request.header(ACCEPT_LANGUAGE, locale);
    }

    let connection = |e: reqwest::Error| ClientError::Connection {
        reason: e.to_string(),
    };
    let response = request.send().await.map_err(connection)?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = response.text().await.map_err(connection)?;
    debug!(%method, %url, status, "request resolved");

    classify(status, content_type.as_deref(), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_errors_are_connection_failures() {
        for status in [500, 502, 503, 599] {
            let result = classify(status, Some("application/json"), "{}".into());
            assert!(matches!(result, Err(ref e) if e.is_connection()), "{status}");
        }
    }

    #[test]
    fn client_errors_carry_the_body() {
        match classify(404, Some("text/plain"), "no such project".into()) {
            Err(ClientError::Application { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such project");
            }
            other => panic!("expected application failure, got {other:?}"),
        }
    }

    #[test]
    fn decodes_by_content_type() -> Result<(), ClientError> {
        let body = classify(202, Some("application/json; charset=utf-8"), r#"{"id": 1}"#.into())?;
        assert_eq!(body, Body::Json(json!({"id": 1})));
        let body = classify(200, Some("text/plain"), r#"{"id": 1}"#.into())?;
        assert_eq!(body, Body::Text(r#"{"id": 1}"#.into()));
        let body = classify(200, None, String::new())?;
        assert!(body.into_json().is_err());
        Ok(())
    }

    #[test]
    fn bad_json_is_a_decode_failure() {
        let result = classify(200, Some("application/json"), "{".into());
        assert!(matches!(result, Err(ClientError::Decode(_))));
    }

    #[test]
    fn list_requires_array() {
        assert!(Body::Json(json!({"a": 1})).into_list().is_err());
        assert_eq!(Body::Json(json!([1, 2])).into_list().ok(), Some(vec![json!(1), json!(2)]));
    }
}
