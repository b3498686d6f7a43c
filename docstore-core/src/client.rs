// docstore-core/src/client.rs
// Client: entry point owning the database registry

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ClientConfig;
use crate::database::{validate_name, Database};
use crate::error::Result;

/// Root handle. Every client owns its own databases; there is no process-wide registry.
#[derive(Clone)]
pub struct Client {
    databases: Arc<DashMap<String, Database>>,
    config: Arc<ClientConfig>,
}

impl Client {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        log::debug!("client created with {:?}", config);
        Client {
            databases: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get database (creates if doesn't exist)
    pub fn database(&self, name: &str) -> Result<Database> {
        validate_name("database", name)?;
        let database = self
            .databases
            .entry(name.to_string())
            .or_insert_with(|| Database::new(name, Arc::clone(&self.config)));
        Ok(database.value().clone())
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    /// Database names, sorted
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn drop_database(&self, name: &str) -> bool {
        let dropped = self.databases.remove(name).is_some();
        if dropped {
            log::debug!("database {} dropped", name);
        }
        dropped
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("databases", &self.database_names())
            .field("config", &self.config)
            .finish()
    }
}
