// docstore-core/src/lib.rs
// In-process document store: Client -> Database -> Collection, Mongo-style queries

pub mod config;
pub mod error;
pub mod value;
pub mod document;
pub mod store;
pub mod query;
pub mod cursor;
pub mod find_options;
pub mod update;
pub mod collection;
pub mod database;
pub mod client;

// Public exports
pub use error::{DocStoreError, Result};
pub use value::{Map, Value};
pub use document::{Document, ID_FIELD};
pub use store::DocumentStore;
pub use query::{Condition, Predicate, Query};
pub use cursor::Cursor;
pub use find_options::FindOptions;
pub use update::{Update, UpdateOperation, UpdateOptions, UpdateResult};
pub use collection::Collection;
pub use database::Database;
pub use client::Client;
pub use config::ClientConfig;
