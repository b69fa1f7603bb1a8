//! # Sample corpus
//!
//! A flat text file of sample incoming documents, one per line, in the form
//!
//! ```text
//! 主旨：<subject>內容：<content>
//! ```
//!
//! The CLI lists these so a user can pick one as the query instead of typing it.

use std::{fs, path::Path};

use serde::Serialize;
use tracing::debug;

use crate::error::{ReplyError, Result};

/// Marker that opens every record.
pub const SUBJECT_MARKER: &str = "主旨：";
/// Marker that separates the subject from the body.
pub const CONTENT_MARKER: &str = "內容：";

/// One parsed sample document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub subject: String,
    pub content: String,
    /// `主旨：{subject}\n內容：{content}`, ready to use as a query.
    pub full_text: String,
}

impl DocumentRecord {
    /// Parse a single line, returning `None` for anything that is not a record.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let rest = line.strip_prefix(SUBJECT_MARKER)?;
        let (subject, content) = rest.split_once(CONTENT_MARKER)?;
        let subject = subject.trim().to_string();
        let content = content.trim().to_string();
        let full_text = format!("{SUBJECT_MARKER}{subject}\n{CONTENT_MARKER}{content}");
        Some(Self {
            subject,
            content,
            full_text,
        })
    }
}

/// Parse every record in `text`, skipping blank and malformed lines.
pub fn parse_corpus(text: &str) -> Vec<DocumentRecord> {
    text.lines().filter_map(DocumentRecord::parse_line).collect()
}

/// Read and parse the corpus file at `path`.
pub fn load_corpus(path: &Path) -> Result<Vec<DocumentRecord>> {
    let text = fs::read_to_string(path).map_err(|source| ReplyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_corpus(&text);
    debug!("Loaded {} sample documents from {}", records.len(), path.display());
    Ok(records)
}

/// The first record of the corpus at `path`, used as the default query.
///
/// # Errors
/// [`ReplyError::Io`] if the file cannot be read; an unreadable corpus is never
/// treated as an empty one.
pub fn first_record(path: &Path) -> Result<Option<DocumentRecord>> {
    Ok(load_corpus(path)?.into_iter().next())
}
