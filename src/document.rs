//! Schema-free documents.
//!
//! A [`Document`] is a JSON object. Stored documents always carry a string
//! `id` field; a document handed to `insert` may omit it and the storage
//! generates one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StoreError;

/// The field map backing a document.
pub type Fields = Map<String, Value>;

/// Name of the mandatory identifier field.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Fields);

impl Document {
    /// Create an empty document without an id.
    pub fn new() -> Self {
        Self(Fields::new())
    }

    /// Create a document holding only the given id.
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut fields = Fields::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        Self(fields)
    }

    /// Build a document from a JSON value. Fails unless the value is an object.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(StoreError::InvalidDocument(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// The string id, if present.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub(crate) fn require_id(&self) -> Result<&str, StoreError> {
        self.id().ok_or(StoreError::MissingId)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Resolve a dotted path (`"owner.name"`) through nested objects.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        self.0
            .insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Shallow merge: fields of `patch` overwrite matching fields, untouched
    /// fields persist.
    pub fn merge(&mut self, patch: &Document) {
        for (key, value) in &patch.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns a new document with `patch` shallow-merged onto `self`.
    pub fn merged(&self, patch: &Document) -> Document {
        let mut next = self.clone();
        next.merge(patch);
        next
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn into_fields(self) -> Fields {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Fields> for Document {
    fn from(fields: Fields) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Document {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Document::from_value(value)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        document.into_value()
    }
}
