use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use jave_core::{CoreError, FieldValue, FromField, Record, Snapshot};

/// How an entity field relates to the backend record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Cached and serialized, under `backend` on the wire.
    Scalar { backend: &'static str },
    /// Cached under its own name, never sent to or read from the backend.
    Local,
    /// Derived from other fields on read; cannot be set.
    Computed,
    /// An id list in the cache, resolved to entities on read.
    Relational,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn scalar(name: &'static str, backend: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar { backend },
        }
    }

    pub const fn local(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Local,
        }
    }

    pub const fn computed(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Computed,
        }
    }

    pub const fn relational(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Relational,
        }
    }
}

/// A cached entity type: its name, id type, field table and place in the
/// snapshot.
pub trait Kind: Send + Sync + 'static {
    const NAME: &'static str;
    const FIELDS: &'static [Field];

    type Id: Copy
        + Ord
        + fmt::Debug
        + fmt::Display
        + FromStr<Err = CoreError>
        + FromField
        + Into<FieldValue>
        + Send
        + Sync
        + 'static;

    fn records(snapshot: &Snapshot) -> &BTreeMap<Self::Id, Record>;

    fn records_mut(snapshot: &mut Snapshot) -> &mut BTreeMap<Self::Id, Record>;

    /// Evaluates a [`FieldKind::Computed`] field.
    fn compute(_name: &str, _record: &Record) -> Option<FieldValue> {
        None
    }

    fn field(name: &str) -> Option<&'static Field> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }

    /// Frontend name of a backend field, if it is a scalar of this kind.
    fn front_of(backend: &str) -> Option<&'static str> {
        Self::FIELDS.iter().find_map(|f| match f.kind {
            FieldKind::Scalar { backend: b } if b == backend => Some(f.name),
            _ => None,
        })
    }

    /// Backend name of a frontend field, if it is a scalar of this kind.
    fn backend_of(name: &str) -> Option<&'static str> {
        match Self::field(name)?.kind {
            FieldKind::Scalar { backend } => Some(backend),
            _ => None,
        }
    }
}

/// Generates typed getters, setters and `with_*` builders for fields stored
/// directly in the record.
macro_rules! accessors {
    ($kind:ty { $($name:literal => $get:ident, $set:ident, $with:ident: $ty:ty;)* }) => {
        impl $crate::entity::Entity<$kind> {
            $(
                pub fn $get(&self) -> Option<$ty> {
                    self.field::<$ty>($name)
                }

                pub fn $set(&self, value: $ty) {
                    self.set($name, value);
                }

                pub fn $with(self, value: $ty) -> Self {
                    self.set($name, value);
                    self
                }
            )*
        }
    };
}

pub(crate) use accessors;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectKind;
    use crate::prompt::PromptKind;

    #[test]
    fn maps_are_inverse_on_scalars() {
        for field in ProjectKind::FIELDS {
            if let FieldKind::Scalar { backend } = field.kind {
                assert_eq!(ProjectKind::front_of(backend), Some(field.name));
                assert_eq!(ProjectKind::backend_of(field.name), Some(backend));
            } else {
                assert_eq!(ProjectKind::backend_of(field.name), None);
            }
        }
        assert_eq!(ProjectKind::front_of("prompts"), None);
        assert_eq!(PromptKind::backend_of("completed"), None);
        assert_eq!(PromptKind::backend_of("progress"), None);
    }
}
