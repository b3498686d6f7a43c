// docstore-core/src/store.rs
// In-memory, insertion-ordered document storage for a single collection

use std::sync::Arc;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::document::Document;
use crate::error::{DocStoreError, Result};
use crate::query::Query;

/// Ordered map `_id -> Document`.
///
/// Documents are held behind `Arc` and never mutated in place: updates swap in a
/// new `Arc`, so snapshots taken by cursors are unaffected by later writes.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: IndexMap<String, Arc<Document>, RandomState>,
}

impl DocumentStore {
    pub fn new() -> Self {
        DocumentStore {
            documents: IndexMap::with_hasher(RandomState::new()),
        }
    }

    fn key_of(document: &Document) -> Result<String> {
        match document.get(crate::document::ID_FIELD) {
            None => Err(DocStoreError::MissingId),
            Some(id) => id.as_str().map(str::to_string).ok_or_else(|| {
                DocStoreError::InvalidDocument(format!("_id must be a string, got {}", id.type_name()))
            }),
        }
    }

    /// Append a document. Fails if `_id` is missing, not a string, or already stored.
    pub fn insert(&mut self, document: Document) -> Result<String> {
        let id = Self::key_of(&document)?;
        if self.documents.contains_key(&id) {
            return Err(DocStoreError::DuplicateKey(id));
        }
        self.documents.insert(id.clone(), Arc::new(document));
        Ok(id)
    }

    /// Insert a batch all-or-nothing: every `_id` is validated against the store and
    /// the rest of the batch before anything is written.
    pub fn insert_many(&mut self, documents: Vec<Document>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut seen = ahash::AHashSet::with_capacity(documents.len());

        for document in &documents {
            let id = Self::key_of(document)?;
            if self.documents.contains_key(&id) || !seen.insert(id.clone()) {
                return Err(DocStoreError::DuplicateKey(id));
            }
            ids.push(id);
        }

        self.documents.reserve(documents.len());
        for (id, document) in ids.iter().zip(documents) {
            self.documents.insert(id.clone(), Arc::new(document));
        }

        Ok(ids)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Document>> {
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| DocStoreError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.values()
    }

    /// Matching documents in insertion order, detached from the store.
    pub fn snapshot(&self, query: &Query) -> Vec<Arc<Document>> {
        self.documents
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect()
    }

    /// Swap in a new version of an existing document, keeping its position.
    ///
    /// The replacement must carry the same `_id`.
    pub fn replace(&mut self, id: &str, document: Document) -> Result<()> {
        if Self::key_of(&document)? != id {
            return Err(DocStoreError::InvalidUpdate("_id cannot be changed".into()));
        }
        let slot = self
            .documents
            .get_mut(id)
            .ok_or_else(|| DocStoreError::NotFound(id.to_string()))?;
        *slot = Arc::new(document);
        Ok(())
    }

    /// Remove a document, preserving the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<Arc<Document>> {
        self.documents.shift_remove(id)
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Document::try_from(json).unwrap()
    }

    fn numbered(n: i64) -> Document {
        doc(json!({"_id": n.to_string(), "count": n}))
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = DocumentStore::new();
        store.insert(numbered(1)).unwrap();
        store.insert(numbered(2)).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("2").unwrap()["count"], Value::Int(2));
        assert!(matches!(store.get("3"), Err(DocStoreError::NotFound(id)) if id == "3"));
    }

    #[test]
    fn test_duplicate_insert_leaves_store_unchanged() {
        let mut store = DocumentStore::new();
        store.insert(doc(json!({"_id": "1", "v": "original"}))).unwrap();

        let err = store.insert(doc(json!({"_id": "1", "v": "replacement"}))).unwrap_err();

        assert!(matches!(err, DocStoreError::DuplicateKey(id) if id == "1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap()["v"], Value::from("original"));
    }

    #[test]
    fn test_missing_or_non_string_id() {
        let mut store = DocumentStore::new();

        assert!(matches!(store.insert(doc(json!({"v": 1}))), Err(DocStoreError::MissingId)));
        assert!(matches!(
            store.insert(doc(json!({"_id": 5}))),
            Err(DocStoreError::InvalidDocument(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_many_is_all_or_nothing() {
        let mut store = DocumentStore::new();
        store.insert(numbered(3)).unwrap();

        let err = store
            .insert_many(vec![numbered(1), numbered(2), numbered(3)])
            .unwrap_err();
        assert!(matches!(err, DocStoreError::DuplicateKey(id) if id == "3"));
        assert_eq!(store.len(), 1);

        let err = store
            .insert_many(vec![numbered(4), numbered(4)])
            .unwrap_err();
        assert!(matches!(err, DocStoreError::DuplicateKey(_)));
        assert_eq!(store.len(), 1);

        let ids = store.insert_many(vec![numbered(4), numbered(5)]).unwrap();
        assert_eq!(ids, vec!["4", "5"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut store = DocumentStore::new();
        for n in [5, 1, 9, 3] {
            store.insert(numbered(n)).unwrap();
        }

        let ids: Vec<&str> = store.iter().filter_map(|d| d.id()).collect();
        assert_eq!(ids, vec!["5", "1", "9", "3"]);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_writes() {
        let mut store = DocumentStore::new();
        store.insert(numbered(1)).unwrap();

        let all = Query::parse(&Value::from(json!({}))).unwrap();
        let snapshot = store.snapshot(&all);

        store.insert(numbered(2)).unwrap();
        store.replace("1", doc(json!({"_id": "1", "count": 100}))).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0]["count"], Value::Int(1));
        assert_eq!(store.get("1").unwrap()["count"], Value::Int(100));
    }

    #[test]
    fn test_replace_rejects_id_change() {
        let mut store = DocumentStore::new();
        store.insert(numbered(1)).unwrap();

        let err = store.replace("1", numbered(2)).unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidUpdate(_)));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut store = DocumentStore::new();
        for n in 1..=4 {
            store.insert(numbered(n)).unwrap();
        }

        assert!(store.remove("2").is_some());
        assert!(store.remove("2").is_none());

        let ids: Vec<&str> = store.iter().filter_map(|d| d.id()).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }
}
