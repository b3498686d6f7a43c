// docstore-core/src/config.rs
// Client-wide settings inherited by every database and collection

use serde::Deserialize;

use crate::error::{DocStoreError, Result};

const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Settings shared by a client and everything it creates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Generate an `_id` for inserted documents that lack one.
    /// When disabled, such inserts fail with `MissingId`.
    pub generate_ids: bool,

    /// Upper bound (bytes) on the compiled size of `$regex` patterns.
    pub regex_size_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            generate_ids: true,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generate_ids(mut self, generate_ids: bool) -> Self {
        self.generate_ids = generate_ids;
        self
    }

    pub fn with_regex_size_limit(mut self, limit: usize) -> Self {
        self.regex_size_limit = limit;
        self
    }

    /// Load settings from JSON text; omitted keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_json::from_str(json).map_err(|e| DocStoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.regex_size_limit == 0 {
            return Err(DocStoreError::Config("regex_size_limit must be positive".into()));
        }
        Ok(())
    }
}
