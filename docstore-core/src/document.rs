// docstore-core/src/document.rs
use std::ops::Index;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocStoreError, Result};
use crate::value::{Map, Value, NULL};

/// Name of the primary identifier field.
pub const ID_FIELD: &str = "_id";

/// A stored record: an ordered field map carrying a string `_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Map::new() }
    }

    /// Generate a fresh identifier (UUID v4, 32 hex characters).
    pub fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// The `_id` value, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Install `_id` as the first field, replacing any previous value.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields.shift_remove(ID_FIELD);
        self.fields.shift_insert(0, ID_FIELD.to_string(), Value::String(id.into()));
    }

    /// Top-level field lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field lookup that also follows dotted paths into nested documents and arrays.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        let (head, rest) = path.split_once('.')?;
        self.fields.get(head)?.get_path(rest)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Set a value at a dotted path, creating intermediate documents as needed.
    ///
    /// Array segments must address an existing element.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<()> {
        let Some((head, rest)) = path.split_once('.') else {
            self.fields.insert(path.to_string(), value);
            return Ok(());
        };

        let mut current = self
            .fields
            .entry(head.to_string())
            .or_insert_with(|| Value::Document(Map::new()));

        let mut segments = rest.split('.').peekable();
        while let Some(segment) = segments.next() {
            let last = segments.peek().is_none();
            current = match current {
                Value::Document(map) => {
                    if last {
                        map.insert(segment.to_string(), value);
                        return Ok(());
                    }
                    map.entry(segment.to_string())
                        .or_insert_with(|| Value::Document(Map::new()))
                }
                Value::Array(arr) => {
                    let index = segment.parse::<usize>().ok().filter(|i| *i < arr.len()).ok_or_else(|| {
                        DocStoreError::InvalidUpdate(format!("cannot address '{}' in array at '{}'", segment, path))
                    })?;
                    if last {
                        arr[index] = value;
                        return Ok(());
                    }
                    &mut arr[index]
                }
                other => {
                    return Err(DocStoreError::InvalidUpdate(format!(
                        "cannot create field '{}' inside a {} at '{}'",
                        segment,
                        other.type_name(),
                        path
                    )))
                }
            };
        }

        Ok(())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Remove the value at a dotted path. Only document fields are removed; array slots are left alone.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let Some((parent, leaf)) = path.rsplit_once('.') else {
            return self.fields.shift_remove(path);
        };

        let (head, rest) = match parent.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (parent, None),
        };

        let mut current = self.fields.get_mut(head)?;
        if let Some(rest) = rest {
            for segment in rest.split('.') {
                current = match current {
                    Value::Document(map) => map.get_mut(segment)?,
                    Value::Array(arr) => arr.get_mut(segment.parse::<usize>().ok()?)?,
                    _ => return None,
                };
            }
        }

        current.as_document_mut()?.shift_remove(leaf)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn fields(&self) -> &Map {
        &self.fields
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Document::try_from(Value::from(value))
    }

    pub fn to_json(&self) -> Result<String> {
        let json: serde_json::Value = Value::Document(self.fields.clone()).into();
        Ok(serde_json::to_string(&json)?)
    }
}

impl From<Map> for Document {
    fn from(fields: Map) -> Self {
        Document { fields }
    }
}

impl TryFrom<Value> for Document {
    type Error = DocStoreError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Document(fields) => Ok(Document { fields }),
            other => Err(DocStoreError::InvalidDocument(format!(
                "expected a document, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<serde_json::Value> for Document {
    type Error = DocStoreError;

    fn try_from(json: serde_json::Value) -> Result<Self> {
        Document::try_from(Value::from(json))
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc.fields)
    }
}

/// Missing fields index to `Null`.
impl Index<&str> for Document {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        self.get_path(field).unwrap_or(&NULL)
    }
}
