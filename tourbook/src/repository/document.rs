//! Documents and relation expansion

use serde_json::{Map, Value};

use crate::query::{ProjectionSpec, ID_FIELD};

/// A stored entity: a JSON object with `_id` and `__v`
pub type Document = Map<String, Value>;

/// Fresh, time-ordered document identifier
///
/// UUIDv7 in simple (hex) form, so lexicographic order follows creation order.
pub fn new_object_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

/// The document's identifier
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Value at a dotted path (`startLocation.address`)
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Relation to expand when reading a document
///
/// `path` names either a reference field (`guides`) or a virtual relation
/// declared on the schema (`reviews`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Populate {
    pub path: String,
    pub select: Option<ProjectionSpec>,
}

impl Populate {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: None,
        }
    }

    #[must_use]
    pub fn select(mut self, projection: ProjectionSpec) -> Self {
        self.select = Some(projection);
        self
    }
}
