//! # Similarity search
//!
//! Finds the historical cases closest to a query:
//!
//! 1. load the index/metadata pair for the requested [`SearchField`] (fresh on every call),
//! 2. embed the query,
//! 3. ask the index for the `top_k` nearest neighbors,
//! 4. join each neighbor to its metadata row by position.
//!
//! Results keep the index's order (nearest first). Lower distance means more similar.

use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{ReplyError, Result};
use crate::index::{IndexEntry, IndexStore, SearchField};

/// A metadata row annotated with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub q: String,
    pub a: String,
    pub distance: f32,
}

impl SearchResult {
    fn from_entry(entry: &IndexEntry, distance: f32) -> Self {
        Self {
            q: entry.q.clone(),
            a: entry.a.clone(),
            distance,
        }
    }
}

pub struct Searcher {
    embedder: Box<dyn Embedder>,
    store: Box<dyn IndexStore>,
    /// Configured embedding length, checked in addition to the index dimension.
    expected_dimension: Option<usize>,
}

impl Searcher {
    pub fn new(embedder: Box<dyn Embedder>, store: Box<dyn IndexStore>) -> Self {
        Self {
            embedder,
            store,
            expected_dimension: None,
        }
    }

    pub fn with_expected_dimension(mut self, dimension: Option<usize>) -> Self {
        self.expected_dimension = dimension;
        self
    }

    /// Retrieve at most `top_k` exemplars for `query` from `field`.
    ///
    /// # Errors
    /// - [`ReplyError::InvalidTopK`] when `top_k` is zero.
    /// - Any load error of the index pair, including misalignment.
    /// - Embedding failures, unchanged.
    /// - [`ReplyError::DimensionMismatch`] when the embedding does not fit the index.
    /// - [`ReplyError::PositionOutOfRange`] when the index points past the metadata table.
    pub async fn search(
        &self,
        query: &str,
        field: SearchField,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(ReplyError::InvalidTopK);
        }

        let pair = self.store.load(field)?;
        let vector = self.embedder.embed(query).await?;

        let expected = pair.index.dimension();
        if vector.len() != expected {
            return Err(ReplyError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        if let Some(configured) = self.expected_dimension {
            if vector.len() != configured {
                return Err(ReplyError::DimensionMismatch {
                    expected: configured,
                    actual: vector.len(),
                });
            }
        }

        let mut results = Vec::with_capacity(top_k);
        for neighbor in pair.index.nearest(&vector, top_k) {
            if results.len() == top_k {
                break;
            }
            let Some(position) = neighbor.position else {
                debug!("Skipping sentinel neighbor");
                continue;
            };
            let entry = pair.entry(position)?;
            results.push(SearchResult::from_entry(entry, neighbor.distance));
        }

        info!("Found {} {} exemplars", results.len(), field);
        Ok(results)
    }
}
