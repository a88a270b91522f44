use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ImageId, ProjectId, PromptId};

/// A single cached field value.
///
/// Records only ever hold scalars or lists of scalars; nested objects from
/// the backend are not representable and are dropped on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Integers widen to floats; the backend does not distinguish `1` from `1.0`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(n) => Some(*n),
            FieldValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts a JSON value received from the backend.
    ///
    /// Returns `None` for objects, which have no cached representation.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => Some(Self::List(
                items.iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

/// Typed extraction of a cached value, used by the generated entity accessors.
pub trait FromField: Sized {
    fn from_field(value: &FieldValue) -> Option<Self>;
}

impl FromField for String {
    fn from_field(value: &FieldValue) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

impl FromField for i64 {
    fn from_field(value: &FieldValue) -> Option<Self> {
        value.as_integer()
    }
}

impl FromField for f64 {
    fn from_field(value: &FieldValue) -> Option<Self> {
        value.as_float()
    }
}

impl FromField for bool {
    fn from_field(value: &FieldValue) -> Option<Self> {
        value.as_boolean()
    }
}

impl<T: FromField> FromField for Vec<T> {
    fn from_field(value: &FieldValue) -> Option<Self> {
        value
            .as_list()
            .map(|items| items.iter().filter_map(T::from_field).collect())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! id_field {
    ($name:ident) => {
        impl FromField for $name {
            fn from_field(value: &FieldValue) -> Option<Self> {
                value.as_text().and_then(|s| s.parse().ok())
            }
        }

        impl From<$name> for FieldValue {
            fn from(id: $name) -> Self {
                Self::Text(id.to_string())
            }
        }
    };
}

id_field!(ProjectId);
id_field!(PromptId);
id_field!(ImageId);
