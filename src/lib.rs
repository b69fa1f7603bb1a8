//! # auto_reply (library root)
//!
//! Drafts replies to formal correspondence from the most similar historical cases.
//!
//! Given an incoming document, the crate
//! - embeds it through an OpenAI-compatible embeddings API ([`embedding`]),
//! - looks up its nearest historical documents or replies in a pre-built HNSW index and
//!   joins them to their metadata rows ([`index`], [`search`]),
//! - renders a constrained prompt from those exemplars ([`prompt`]),
//! - and asks a chat model to draft the reply ([`completion`]).
//!
//! [`pipeline::ReplyPipeline`] runs those steps in order for one request. The `areply`
//! binary is a thin CLI over it ([`commands`]); [`corpus`] parses the sample documents the
//! CLI offers as ready-made queries.
//!
//! ## Configuration
//! All endpoints, credentials, and paths live in a YAML file loaded into
//! [`config::ReplyConfig`] at startup and passed down explicitly. By default it is read from
//! `config.yaml` in [`config_dir`]:
//!
//! - macOS: `~/Library/Application Support/tw.auto-reply.areply/`
//! - Linux (XDG): `~/.config/areply/`
//! - Windows: `C:\Users\<you>\AppData\Roaming\auto-reply\areply\config\`

use directories::ProjectDirs;
use std::path::PathBuf;

pub mod commands;
pub mod completion;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod prompt;
pub mod search;

pub use error::{ReplyError, Result};

/// Return the per-platform configuration directory used by `areply`.
///
/// The directory is **not** created by this function; callers that need it should
/// create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns [`ReplyError::Config`] if the platform configuration directory cannot be
/// determined (which is rare but possible in heavily sandboxed environments).
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("tw", "auto-reply", "areply")
        .ok_or_else(|| ReplyError::Config("unable to determine config directory".to_string()))?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
