// docstore-core/src/find_options.rs
// Find query options: projection, sort, limit, skip

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::document::{Document, ID_FIELD};
use crate::error::{DocStoreError, Result};
use crate::value::{Map, NULL};

/// Options for find queries
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Projection: field → 1 (include) or 0 (exclude)
    /// Special case: _id can be excluded in include mode
    pub projection: Option<HashMap<String, i32>>,

    /// Sort: [(field, direction)], direction: 1 (asc) or -1 (desc)
    pub sort: Option<Vec<(String, i32)>>,

    /// Limit: maximum number of documents to return
    pub limit: Option<usize>,

    /// Skip: number of documents to skip (for pagination)
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: HashMap<String, i32>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Vec<(String, i32)>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(sort) = &self.sort {
            if let Some((field, direction)) = sort.iter().find(|(_, d)| *d != 1 && *d != -1) {
                return Err(DocStoreError::InvalidQuery(format!(
                    "sort direction for '{}' must be 1 or -1, got {}",
                    field, direction
                )));
            }
        }
        if let Some(projection) = &self.projection {
            if let Some((field, action)) = projection.iter().find(|(_, a)| **a != 0 && **a != 1) {
                return Err(DocStoreError::InvalidQuery(format!(
                    "projection for '{}' must be 0 or 1, got {}",
                    field, action
                )));
            }
        }
        Ok(())
    }

    /// Sort, skip, limit, then project.
    pub(crate) fn apply(&self, mut docs: Vec<Arc<Document>>) -> Vec<Arc<Document>> {
        if let Some(ref sort) = self.sort {
            apply_sort(&mut docs, sort);
        }

        docs = apply_limit_skip(docs, self.limit, self.skip);

        if let Some(ref projection) = self.projection {
            docs = docs
                .into_iter()
                .map(|doc| Arc::new(apply_projection(&doc, projection)))
                .collect();
        }

        docs
    }
}

/// Apply projection to a document, keeping the document's field order
pub fn apply_projection(doc: &Document, projection: &HashMap<String, i32>) -> Document {
    if projection.is_empty() {
        return doc.clone();
    }

    // Detect mode
    let has_inclusions = projection.values().any(|&v| v == 1);
    let has_non_id_exclusions = projection
        .iter()
        .any(|(field, &action)| action == 0 && field != ID_FIELD);

    let include_mode = has_inclusions && !has_non_id_exclusions;

    let keep = |field: &str| -> bool {
        if include_mode {
            if field == ID_FIELD {
                // Include _id unless explicitly excluded
                projection.get(ID_FIELD) != Some(&0)
            } else {
                projection.get(field) == Some(&1)
            }
        } else {
            projection.get(field) != Some(&0)
        }
    };

    let fields: Map = doc
        .iter()
        .filter(|(field, _)| keep(field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();

    Document::from(fields)
}

/// Apply sort to documents (stable: ties keep their current order)
pub fn apply_sort(docs: &mut [Arc<Document>], sort: &[(String, i32)]) {
    if sort.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let val_a = a.get_path(field).unwrap_or(&NULL);
            let val_b = b.get_path(field).unwrap_or(&NULL);

            let cmp = val_a.canonical_cmp(val_b);

            if cmp != Ordering::Equal {
                return if *direction == 1 { cmp } else { cmp.reverse() };
            }
        }
        Ordering::Equal
    });
}

/// Apply limit and skip to documents
pub fn apply_limit_skip(
    docs: Vec<Arc<Document>>,
    limit: Option<usize>,
    skip: Option<usize>,
) -> Vec<Arc<Document>> {
    let skip_count = skip.unwrap_or(0);

    docs.into_iter()
        .skip(skip_count)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
