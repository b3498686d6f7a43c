// docstore-core/src/collection.rs
// Collection handle: routes inserts and queries to the collection's store

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ClientConfig;
use crate::cursor::Cursor;
use crate::document::{Document, ID_FIELD};
use crate::error::Result;
use crate::find_options::FindOptions;
use crate::query::Query;
use crate::store::DocumentStore;
use crate::update::{Update, UpdateOptions, UpdateResult};
use crate::value::Value;

/// A named set of documents. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct Collection {
    name: String,
    namespace: String,
    store: Arc<RwLock<DocumentStore>>,
    config: Arc<ClientConfig>,
}

impl Collection {
    pub(crate) fn new(database: &str, name: &str, config: Arc<ClientConfig>) -> Self {
        let namespace = format!("{}.{}", database, name);
        log::debug!("collection {} created", namespace);
        Collection {
            name: name.to_string(),
            namespace,
            store: Arc::new(RwLock::new(DocumentStore::new())),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `database.collection`
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    fn prepare(&self, document: Value) -> Result<Document> {
        let mut document = Document::try_from(document)?;
        self.assign_id(&mut document);
        Ok(document)
    }

    fn assign_id(&self, document: &mut Document) {
        if !document.contains(ID_FIELD) && self.config.generate_ids {
            document.set_id(Document::generate_id());
        }
    }

    fn compile(&self, query: Value) -> Result<Query> {
        Query::compile(&query, &self.config)
    }

    /// Insert one document - returns its `_id`
    pub fn insert(&self, document: impl Into<Value>) -> Result<String> {
        let document = self.prepare(document.into())?;
        let result = self.store.write().insert(document);

        match &result {
            Ok(id) => log::debug!("{}: inserted {}", self.namespace, id),
            Err(e) => log::warn!("{}: insert rejected: {}", self.namespace, e),
        }
        result
    }

    /// Insert a batch; either every document is inserted or none is.
    pub fn insert_many<I, D>(&self, documents: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = D>,
        D: Into<Value>,
    {
        let documents = documents
            .into_iter()
            .map(|d| self.prepare(d.into()))
            .collect::<Result<Vec<_>>>()?;

        let result = self.store.write().insert_many(documents);

        match &result {
            Ok(ids) => log::debug!("{}: inserted {} documents", self.namespace, ids.len()),
            Err(e) => log::warn!("{}: batch insert rejected: {}", self.namespace, e),
        }
        result
    }

    /// Document by `_id`; fails with `NotFound`.
    pub fn get(&self, id: &str) -> Result<Arc<Document>> {
        self.store.read().get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.read().contains(id)
    }

    /// Open a cursor over the documents matching `query`, in insertion order.
    pub fn find(&self, query: impl Into<Value>) -> Result<Cursor> {
        let query = self.compile(query.into())?;
        let snapshot = self.store.read().snapshot(&query);
        log::debug!("{}: find matched {} documents", self.namespace, snapshot.len());
        Ok(Cursor::new(self.namespace.clone(), snapshot))
    }

    /// Find with sort, skip, limit and projection applied before the snapshot is fixed.
    pub fn find_with_options(&self, query: impl Into<Value>, options: FindOptions) -> Result<Cursor> {
        options.validate()?;
        let query = self.compile(query.into())?;
        let matching = self.store.read().snapshot(&query);
        let snapshot = options.apply(matching);
        log::debug!("{}: find returned {} documents", self.namespace, snapshot.len());
        Ok(Cursor::new(self.namespace.clone(), snapshot))
    }

    /// First matching document in insertion order, or `None`.
    pub fn find_one(&self, query: impl Into<Value>) -> Result<Option<Arc<Document>>> {
        let mut cursor = self.find(query)?;
        let found = if cursor.next()? {
            Some(Arc::clone(cursor.current()?))
        } else {
            None
        };
        cursor.close();
        Ok(found)
    }

    pub fn count_documents(&self, query: impl Into<Value>) -> Result<usize> {
        let query = self.compile(query.into())?;
        let store = self.store.read();
        Ok(store.iter().filter(|doc| query.matches(doc)).count())
    }

    /// Distinct values of `field` among matching documents, in first-seen order.
    /// Missing fields are skipped.
    pub fn distinct(&self, field: &str, query: impl Into<Value>) -> Result<Vec<Value>> {
        let query = self.compile(query.into())?;
        let store = self.store.read();

        let mut values: Vec<Value> = Vec::new();
        for doc in store.iter().filter(|doc| query.matches(doc)) {
            if let Some(value) = doc.get_path(field) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    /// Update the first matching document - returns matched/modified counts
    pub fn update_one(&self, query: impl Into<Value>, update: impl Into<Value>) -> Result<UpdateResult> {
        self.update(query.into(), update.into(), false, UpdateOptions::default())
    }

    /// Update every matching document. All changes are computed before any is stored,
    /// so a failing update leaves the collection untouched.
    pub fn update_many(&self, query: impl Into<Value>, update: impl Into<Value>) -> Result<UpdateResult> {
        self.update(query.into(), update.into(), true, UpdateOptions::default())
    }

    /// `update_one` with options (upsert)
    pub fn update_one_with_options(
        &self,
        query: impl Into<Value>,
        update: impl Into<Value>,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        self.update(query.into(), update.into(), false, options)
    }

    /// `update_many` with options (upsert)
    pub fn update_many_with_options(
        &self,
        query: impl Into<Value>,
        update: impl Into<Value>,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        self.update(query.into(), update.into(), true, options)
    }

    fn update(&self, query: Value, update: Value, many: bool, options: UpdateOptions) -> Result<UpdateResult> {
        let query = self.compile(query)?;
        let update = Update::parse(&update)?;

        let mut store = self.store.write();
        let mut result = UpdateResult::default();
        let mut changed = Vec::new();

        for doc in store.iter().filter(|doc| query.matches(doc)) {
            result.matched += 1;

            let mut updated = Document::clone(doc);
            if update.apply(&mut updated)? {
                changed.push(updated);
            }
            if !many {
                break;
            }
        }

        for updated in changed {
            let id = updated.id().unwrap_or_default().to_string();
            store.replace(&id, updated)?;
            result.modified += 1;
        }

        if result.matched == 0 && options.upsert {
            let mut document = update.upsert_document()?;
            self.assign_id(&mut document);
            let id = store.insert(document)?;
            log::debug!("{}: upserted {}", self.namespace, id);
            result.upserted_id = Some(id);
        }

        log::debug!(
            "{}: update matched {} modified {}",
            self.namespace,
            result.matched,
            result.modified
        );
        Ok(result)
    }

    /// Delete the first matching document - returns the number deleted
    pub fn delete_one(&self, query: impl Into<Value>) -> Result<u64> {
        self.delete(query.into(), false)
    }

    pub fn delete_many(&self, query: impl Into<Value>) -> Result<u64> {
        self.delete(query.into(), true)
    }

    fn delete(&self, query: Value, many: bool) -> Result<u64> {
        let query = self.compile(query)?;
        let mut store = self.store.write();

        let ids: Vec<String> = store
            .iter()
            .filter(|doc| query.matches(doc))
            .filter_map(|doc| doc.id().map(str::to_string))
            .take(if many { usize::MAX } else { 1 })
            .collect();

        for id in &ids {
            store.remove(id);
        }

        log::debug!("{}: deleted {} documents", self.namespace, ids.len());
        Ok(ids.len() as u64)
    }

    /// Remove every document.
    pub fn clear(&self) {
        self.store.write().clear();
        log::debug!("{}: cleared", self.namespace);
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("namespace", &self.namespace)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocStoreError;
    use serde_json::json;

    // Setup only one time for the unit test binary
    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    fn collection() -> Collection {
        Collection::new("test", "items", Arc::new(ClientConfig::default()))
    }

    fn seeded(n: i64) -> Collection {
        let coll = collection();
        coll.insert_many((0..n).map(|i| json!({"_id": i.to_string(), "count": i, "countStr": i.to_string()})))
            .unwrap();
        coll
    }

    #[test]
    fn test_insert_generates_missing_id() {
        let coll = collection();
        let id = coll.insert(json!({"name": "Alice"})).unwrap();

        assert_eq!(id.len(), 32);
        let doc = coll.get(&id).unwrap();
        assert_eq!(doc.id(), Some(id.as_str()));
        assert_eq!(doc["name"], Value::from("Alice"));
    }

    #[test]
    fn test_insert_without_id_generation_fails() {
        let coll = Collection::new(
            "test",
            "items",
            Arc::new(ClientConfig::default().with_generate_ids(false)),
        );
        assert!(matches!(coll.insert(json!({"name": "Alice"})), Err(DocStoreError::MissingId)));
        assert!(coll.is_empty());
    }

    #[test]
    fn test_insert_rejects_non_document() {
        let coll = collection();
        assert!(matches!(coll.insert(json!(5)), Err(DocStoreError::InvalidDocument(_))));
    }

    #[test]
    fn test_find_one_returns_first_in_insertion_order() {
        let coll = seeded(20);

        let doc = coll.find_one(json!({"count": {"$gt": 5}})).unwrap().unwrap();
        assert_eq!(doc["count"], Value::Int(6));

        assert!(coll.find_one(json!({"count": {"$gt": 500}})).unwrap().is_none());
    }

    #[test]
    fn test_find_rejects_invalid_query() {
        let coll = seeded(3);
        assert!(matches!(coll.find(json!({"count": {"$near": 1}})), Err(DocStoreError::InvalidQuery(_))));
        assert!(matches!(coll.find_one(json!({"$or": 1})), Err(DocStoreError::InvalidQuery(_))));
    }

    #[test]
    fn test_cursor_snapshot_ignores_later_inserts() {
        let coll = seeded(3);
        let mut cursor = coll.find(json!({})).unwrap();

        coll.insert(json!({"_id": "late", "count": 99})).unwrap();

        assert_eq!(cursor.len().unwrap(), 3);
        let mut seen = 0;
        while cursor.next().unwrap() {
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert_eq!(coll.len(), 4);
    }

    #[test]
    fn test_count_and_distinct() {
        let coll = seeded(10);
        coll.insert(json!({"_id": "x", "tag": "a"})).unwrap();
        coll.insert(json!({"_id": "y", "tag": "b"})).unwrap();
        coll.insert(json!({"_id": "z", "tag": "a"})).unwrap();

        assert_eq!(coll.count_documents(json!({"count": {"$lt": 4}})).unwrap(), 4);
        assert_eq!(
            coll.distinct("tag", json!({})).unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn test_update_one_and_many() {
        let coll = seeded(10);

        let result = coll.update_one(json!({"count": {"$gte": 5}}), json!({"$inc": {"count": 100}})).unwrap();
        assert_eq!(result, UpdateResult { matched: 1, modified: 1, upserted_id: None });
        assert_eq!(coll.get("5").unwrap()["count"], Value::Int(105));
        assert_eq!(coll.get("6").unwrap()["count"], Value::Int(6));

        let result = coll.update_many(json!({"count": {"$lt": 3}}), json!({"$set": {"low": true}})).unwrap();
        assert_eq!(result, UpdateResult { matched: 3, modified: 3, upserted_id: None });
        assert_eq!(coll.count_documents(json!({"low": true})).unwrap(), 3);
    }

    #[test]
    fn test_update_keeps_insertion_order() {
        let coll = seeded(3);
        coll.update_one(json!({"_id": "0"}), json!({"$set": {"touched": true}})).unwrap();

        let mut cursor = coll.find(json!({})).unwrap();
        cursor.next().unwrap();
        assert_eq!(cursor.get("_id").unwrap(), &Value::from("0"));
        assert_eq!(cursor.get("touched").unwrap(), &Value::Bool(true));
    }

    #[test]
    fn test_failed_update_many_changes_nothing() {
        let coll = seeded(3);
        coll.insert(json!({"_id": "s", "count": "three"})).unwrap();

        let err = coll.update_many(json!({}), json!({"$inc": {"count": 1}})).unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidUpdate(_)));
        assert_eq!(coll.get("0").unwrap()["count"], Value::Int(0));
    }

    #[test]
    fn test_upsert_inserts_when_nothing_matches() {
        let coll = seeded(3);
        let options = UpdateOptions::new().with_upsert(true);

        let result = coll
            .update_one_with_options(
                json!({"count": 42}),
                json!({"$set": {"countStr": "42"}, "$inc": {"count": 42}}),
                options,
            )
            .unwrap();

        assert_eq!(result.matched, 0);
        assert_eq!(result.modified, 0);
        let id = result.upserted_id.unwrap();
        assert_eq!(id.len(), 32);

        let doc = coll.get(&id).unwrap();
        assert_eq!(doc["count"], Value::Int(42));
        assert_eq!(doc["countStr"], Value::from("42"));
        assert_eq!(coll.len(), 4);
    }

    #[test]
    fn test_upsert_with_match_only_updates() {
        let coll = seeded(3);
        let options = UpdateOptions::new().with_upsert(true);

        let result = coll
            .update_many_with_options(json!({"count": {"$lt": 2}}), json!({"$set": {"low": true}}), options)
            .unwrap();

        assert_eq!(result, UpdateResult { matched: 2, modified: 2, upserted_id: None });
        assert_eq!(coll.len(), 3);
    }

    #[test]
    fn test_upsert_without_id_generation_fails() {
        let coll = Collection::new(
            "test",
            "items",
            Arc::new(ClientConfig::default().with_generate_ids(false)),
        );
        let options = UpdateOptions::new().with_upsert(true);

        let err = coll
            .update_one_with_options(json!({"n": 1}), json!({"$set": {"n": 1}}), options)
            .unwrap_err();
        assert!(matches!(err, DocStoreError::MissingId));
        assert!(coll.is_empty());
    }

    #[test]
    fn test_delete_one_and_many() {
        let coll = seeded(10);

        assert_eq!(coll.delete_one(json!({"count": {"$gte": 5}})).unwrap(), 1);
        assert!(!coll.contains("5"));
        assert!(coll.contains("6"));

        assert_eq!(coll.delete_many(json!({"count": {"$gte": 5}})).unwrap(), 4);
        assert_eq!(coll.len(), 5);

        assert_eq!(coll.delete_many(json!({"count": {"$gte": 5}})).unwrap(), 0);
    }

    #[test]
    fn test_find_with_options() {
        let coll = seeded(10);
        let options = FindOptions::new()
            .with_sort(vec![("count".to_string(), -1)])
            .with_skip(1)
            .with_limit(3);

        let mut cursor = coll.find_with_options(json!({"count": {"$lt": 8}}), options).unwrap();
        let mut counts = Vec::new();
        while cursor.next().unwrap() {
            counts.push(cursor.get("count").unwrap().clone());
        }
        assert_eq!(counts, vec![Value::Int(6), Value::Int(5), Value::Int(4)]);
    }
}
