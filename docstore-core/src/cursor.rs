// docstore-core/src/cursor.rs
// Snapshot cursor returned by Collection::find

use std::sync::Arc;

use crate::document::Document;
use crate::error::{DocStoreError, Result};
use crate::value::{Value, NULL};

/// Iterator over the documents that matched a query when the cursor was opened.
///
/// The result set is captured at open time; later writes to the collection do
/// not affect it. After [`Cursor::close`] every operation fails with
/// `CursorClosed`.
#[derive(Debug)]
pub struct Cursor {
    namespace: String,
    /// `None` once closed.
    snapshot: Option<Vec<Arc<Document>>>,
    /// Index of the current document, if positioned on one.
    current: Option<usize>,
    next_index: usize,
}

impl Cursor {
    pub(crate) fn new(namespace: String, snapshot: Vec<Arc<Document>>) -> Self {
        log::trace!("cursor opened on {} with {} documents", namespace, snapshot.len());
        Cursor {
            namespace,
            snapshot: Some(snapshot),
            current: None,
            next_index: 0,
        }
    }

    fn documents(&self) -> Result<&[Arc<Document>]> {
        self.snapshot.as_deref().ok_or(DocStoreError::CursorClosed)
    }

    /// Number of documents in the snapshot. Does not move the cursor.
    pub fn len(&self) -> Result<usize> {
        Ok(self.documents()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.documents()?.is_empty())
    }

    /// Advance to the next document. Returns `false` once the snapshot is exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool> {
        let len = self.documents()?.len();
        if self.next_index < len {
            self.current = Some(self.next_index);
            self.next_index += 1;
            log::trace!("cursor on {} advanced to {}", self.namespace, self.next_index - 1);
            Ok(true)
        } else {
            self.current = None;
            Ok(false)
        }
    }

    /// Would a subsequent `next()` return `true`?
    pub fn has_next(&self) -> Result<bool> {
        Ok(self.next_index < self.documents()?.len())
    }

    /// The document the cursor is positioned on.
    pub fn current(&self) -> Result<&Arc<Document>> {
        let documents = self.documents()?;
        self.current
            .and_then(|i| documents.get(i))
            .ok_or(DocStoreError::NoCurrentDocument)
    }

    /// Field of the current document; missing fields read as `Null`.
    pub fn get(&self, field: &str) -> Result<&Value> {
        Ok(self.current()?.get_path(field).unwrap_or(&NULL))
    }

    /// Drain the documents not yet visited.
    pub fn remaining(&mut self) -> Result<Vec<Arc<Document>>> {
        let (rest, len) = {
            let documents = self.documents()?;
            (documents[self.next_index..].to_vec(), documents.len())
        };
        self.next_index = len;
        self.current = None;
        Ok(rest)
    }

    /// Release the snapshot. Safe to call more than once.
    pub fn close(&mut self) {
        if self.snapshot.take().is_some() {
            log::debug!("cursor on {} closed", self.namespace);
        }
        self.current = None;
    }

    pub fn is_closed(&self) -> bool {
        self.snapshot.is_none()
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}
