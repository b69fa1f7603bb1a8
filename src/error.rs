//! # Error types
//!
//! Every fallible library operation returns [`Result`], whose error is a
//! [`ReplyError`]. Failures of the completion call are the one exception: they
//! are captured as [`crate::completion::CompletionError`] so that a draft can
//! still be shown to the user alongside a fixed diagnostic.

use std::path::PathBuf;

use thiserror::Error;

use crate::index::SearchField;

/// Errors raised while loading configuration, searching, or composing prompts.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The configuration file is present but unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A file could not be read.
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A metadata table is not a JSON array of `{q, a}` objects.
    #[error("invalid metadata table {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The vector index file could not be loaded.
    #[error("unable to load vector index {path}: {message}")]
    Index { path: PathBuf, message: String },

    /// The vector index and its metadata table disagree on their row count.
    #[error("{field} index holds {vectors} vectors but its metadata table has {rows} rows")]
    Misaligned {
        field: SearchField,
        rows: usize,
        vectors: usize,
    },

    /// The index returned a position with no metadata row behind it.
    #[error("index returned position {position} but the metadata table has {rows} rows")]
    PositionOutOfRange { position: usize, rows: usize },

    /// The query embedding does not fit the index.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding provider failed or answered without a vector.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// An exemplar document lacks the `說明：` delimiter.
    #[error("malformed exemplar record #{position}: {reason}")]
    MalformedExemplar { position: usize, reason: String },

    /// `top_k` must be at least 1.
    #[error("top_k must be at least 1")]
    InvalidTopK,

    /// The query was empty; nothing was searched.
    #[error("query is empty")]
    EmptyQuery,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ReplyError>;
