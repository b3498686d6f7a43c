// docstore-core/src/update.rs
// Update documents: $set, $inc, $unset

use crate::document::{Document, ID_FIELD};
use crate::error::{DocStoreError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    Set(String, Value),
    Inc(String, Value),
    Unset(String),
}

/// A parsed update document, applied in field order.
#[derive(Debug, Clone)]
pub struct Update {
    operations: Vec<UpdateOperation>,
}

/// Outcome of update_one / update_many
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    /// `_id` of the document inserted by an upsert
    pub upserted_id: Option<String>,
}

/// Options for update queries
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Insert a document built from the `$set`/`$inc` fields when nothing matches
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

impl Update {
    pub fn parse(update: &Value) -> Result<Self> {
        let map = update
            .as_document()
            .ok_or_else(|| DocStoreError::InvalidUpdate("update must be a document".into()))?;
        if map.is_empty() {
            return Err(DocStoreError::InvalidUpdate("update document is empty".into()));
        }

        let mut operations = Vec::new();
        for (op, fields) in map {
            let fields = fields.as_document().ok_or_else(|| {
                DocStoreError::InvalidUpdate(format!("{} requires a document of fields", op))
            })?;

            for (field, value) in fields {
                if field == ID_FIELD || field.starts_with("_id.") {
                    return Err(DocStoreError::InvalidUpdate("_id cannot be changed".into()));
                }
                let operation = match op.as_str() {
                    "$set" => UpdateOperation::Set(field.clone(), value.clone()),
                    "$inc" if value.is_number() => UpdateOperation::Inc(field.clone(), value.clone()),
                    "$inc" => {
                        return Err(DocStoreError::InvalidUpdate(format!(
                            "$inc on '{}' requires a number, got {}",
                            field,
                            value.type_name()
                        )))
                    }
                    "$unset" => UpdateOperation::Unset(field.clone()),
                    _ => {
                        return Err(DocStoreError::InvalidUpdate(format!(
                            "Unsupported update operator: {}",
                            op
                        )))
                    }
                };
                operations.push(operation);
            }
        }

        Ok(Update { operations })
    }

    pub fn operations(&self) -> &[UpdateOperation] {
        &self.operations
    }

    /// New document for an upsert: the `$set` and `$inc` fields applied to an
    /// empty document. `$unset` has nothing to remove. No `_id` is assigned.
    pub fn upsert_document(&self) -> Result<Document> {
        let mut document = Document::new();
        self.apply(&mut document)?;
        Ok(document)
    }

    /// Apply to a document; returns whether anything changed.
    pub fn apply(&self, document: &mut Document) -> Result<bool> {
        let mut was_modified = false;

        for operation in &self.operations {
            match operation {
                UpdateOperation::Set(field, value) => {
                    if document.get_path(field) != Some(value) {
                        document.set_path(field, value.clone())?;
                        was_modified = true;
                    }
                }
                UpdateOperation::Inc(field, inc) => {
                    let current = document.get_path(field);
                    let next = match current {
                        None => inc.clone(),
                        Some(current) => Self::add(field, current, inc)?,
                    };
                    if current.map_or(true, |current| !Self::same_number(current, &next)) {
                        document.set_path(field, next)?;
                        was_modified = true;
                    }
                }
                UpdateOperation::Unset(field) => {
                    if document.remove_path(field).is_some() {
                        was_modified = true;
                    }
                }
            }
        }

        Ok(was_modified)
    }

    /// Equal in value and in numeric kind, so `5` + `0.0` still counts as a change.
    fn same_number(a: &Value, b: &Value) -> bool {
        matches!(
            (a, b),
            (Value::Int(_), Value::Int(_)) | (Value::Float(_), Value::Float(_))
        ) && a == b
    }

    fn add(field: &str, current: &Value, inc: &Value) -> Result<Value> {
        match (current, inc) {
            // Try int first to preserve integer types
            (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(|| {
                DocStoreError::InvalidUpdate(format!("$inc overflows integer field '{}'", field))
            }),
            _ => match (current.as_f64(), inc.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(DocStoreError::InvalidUpdate(format!(
                    "cannot $inc non-numeric field '{}' ({})",
                    field,
                    current.type_name()
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(json: serde_json::Value) -> Result<Update> {
        Update::parse(&Value::from(json))
    }

    fn doc(json: serde_json::Value) -> Document {
        Document::try_from(json).unwrap()
    }

    #[test]
    fn test_set_and_unset() {
        let mut d = doc(json!({"_id": "1", "name": "Alice", "temp": true}));
        let u = update(json!({"$set": {"name": "Bob", "profile.age": 30}, "$unset": {"temp": ""}})).unwrap();

        assert!(u.apply(&mut d).unwrap());
        assert_eq!(d["name"], Value::from("Bob"));
        assert_eq!(d["profile.age"], Value::Int(30));
        assert!(!d.contains("temp"));
    }

    #[test]
    fn test_set_same_value_is_not_a_modification() {
        let mut d = doc(json!({"_id": "1", "name": "Alice"}));
        let u = update(json!({"$set": {"name": "Alice"}})).unwrap();
        assert!(!u.apply(&mut d).unwrap());

        let u = update(json!({"$unset": {"missing": 1}})).unwrap();
        assert!(!u.apply(&mut d).unwrap());
    }

    #[test]
    fn test_inc() {
        let mut d = doc(json!({"_id": "1", "count": 5, "score": 1.5}));
        let u = update(json!({"$inc": {"count": 2, "score": 1, "fresh": 3}})).unwrap();

        assert!(u.apply(&mut d).unwrap());
        assert_eq!(d["count"], Value::Int(7));
        assert!(matches!(d["count"], Value::Int(_)));
        assert_eq!(d["score"], Value::Float(2.5));
        assert_eq!(d["fresh"], Value::Int(3));
    }

    #[test]
    fn test_inc_by_zero_is_not_a_modification() {
        let mut d = doc(json!({"_id": "1", "count": 5, "score": 1.5}));

        let u = update(json!({"$inc": {"count": 0, "score": 0.0}})).unwrap();
        assert!(!u.apply(&mut d).unwrap());
        assert_eq!(d["count"], Value::Int(5));

        // Missing field is created even for a zero increment
        let u = update(json!({"$inc": {"fresh": 0}})).unwrap();
        assert!(u.apply(&mut d).unwrap());
        assert_eq!(d["fresh"], Value::Int(0));
    }

    #[test]
    fn test_upsert_document_from_set_and_inc() {
        let u = update(json!({
            "$set": {"name": "Carol", "profile.city": "Oslo"},
            "$inc": {"visits": 1},
            "$unset": {"temp": ""}
        }))
        .unwrap();

        let d = u.upsert_document().unwrap();
        assert_eq!(d["name"], Value::from("Carol"));
        assert_eq!(d["profile.city"], Value::from("Oslo"));
        assert_eq!(d["visits"], Value::Int(1));
        assert!(d.id().is_none());
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn test_inc_errors() {
        let mut d = doc(json!({"_id": "1", "name": "x", "big": i64::MAX}));

        let u = update(json!({"$inc": {"name": 1}})).unwrap();
        assert!(matches!(u.apply(&mut d), Err(DocStoreError::InvalidUpdate(_))));

        let u = update(json!({"$inc": {"big": 1}})).unwrap();
        assert!(matches!(u.apply(&mut d), Err(DocStoreError::InvalidUpdate(_))));

        assert!(matches!(update(json!({"$inc": {"n": "1"}})), Err(DocStoreError::InvalidUpdate(_))));
    }

    #[test]
    fn test_invalid_updates() {
        for u in [
            json!({}),
            json!([1]),
            json!({"$push": {"tags": "a"}}),
            json!({"$set": 5}),
            json!({"$set": {"_id": "2"}}),
            json!({"name": "plain replacement"}),
        ] {
            assert!(
                matches!(update(u.clone()), Err(DocStoreError::InvalidUpdate(_))),
                "expected InvalidUpdate for {}",
                u
            );
        }
    }
}
