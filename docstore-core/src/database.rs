// docstore-core/src/database.rs
// Database: a named registry of collections

use std::sync::Arc;

use dashmap::DashMap;

use crate::collection::Collection;
use crate::config::ClientConfig;
use crate::error::{DocStoreError, Result};

/// Reject names that cannot appear in a `database.collection` namespace.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DocStoreError::InvalidName(format!("{} name cannot be empty", kind)));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '$' | '.' | '\0')) {
        return Err(DocStoreError::InvalidName(format!(
            "{} name '{}' contains illegal character {:?}",
            kind, name, c
        )));
    }
    Ok(())
}

/// Handle to a database. Clones share the same collections.
#[derive(Clone)]
pub struct Database {
    name: String,
    collections: Arc<DashMap<String, Collection>>,
    config: Arc<ClientConfig>,
}

impl Database {
    pub(crate) fn new(name: &str, config: Arc<ClientConfig>) -> Self {
        log::debug!("database {} created", name);
        Database {
            name: name.to_string(),
            collections: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get collection (creates if doesn't exist)
    pub fn collection(&self, name: &str) -> Result<Collection> {
        validate_name("collection", name)?;
        let collection = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(&self.name, name, Arc::clone(&self.config)));
        Ok(collection.value().clone())
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Collection names, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Drop collection - returns whether it existed. Open handles keep their documents.
    pub fn drop_collection(&self, name: &str) -> bool {
        let dropped = self.collections.remove(name).is_some();
        if dropped {
            log::debug!("collection {}.{} dropped", self.name, name);
        }
        dropped
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("collections", &self.collection_names())
            .finish()
    }
}
