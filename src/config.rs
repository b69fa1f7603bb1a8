//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the [`ReplyConfig`] struct, which holds the credentials and endpoints of the
//! two upstream providers plus the location of the vector storage, and a [`load_config`]
//! function to load the configuration from a YAML file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use auto_reply::config::{ReplyConfig, load_config};
//!
//! let config: ReplyConfig = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config.vector_db_path);
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::{ReplyError, Result};

/// Number of exemplars retrieved when neither the config nor the caller says otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// Settings for the embeddings endpoint.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct EmbeddingConfig {
    /// The API key used to authenticate requests to the API.
    pub api_key: String,

    /// The base URL of the API, e.g. `https://api.openai.com/v1`.
    pub api_base: String,

    /// The embedding model the indexes were built with.
    pub model: String,

    /// Expected vector length. When set, every embedding is checked against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

/// Settings for the chat-completion endpoint.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct CompletionConfig {
    /// The API key used to authenticate requests to the API.
    pub api_key: String,

    /// The base URL of the API; `/chat/completions` is appended to it.
    pub api_base: String,

    /// The name of the model that drafts the reply.
    pub model: String,

    /// Request timeout in seconds; the HTTP client default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Represents the application's configuration.
///
/// Constructed once at startup and handed to every component that needs it;
/// nothing reads credentials from process-wide state.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct ReplyConfig {
    pub embedding: EmbeddingConfig,

    pub completion: CompletionConfig,

    /// Directory holding `index_q.hnsw`, `meta_q.json`, `index_a.hnsw` and `meta_a.json`.
    pub vector_db_path: PathBuf,

    /// Optional file of sample incoming documents offered by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<PathBuf>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl ReplyConfig {
    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(ReplyError::Config("top_k must be at least 1".to_string()));
        }
        for (section, api_base, model) in [
            ("embedding", &self.embedding.api_base, &self.embedding.model),
            ("completion", &self.completion.api_base, &self.completion.model),
        ] {
            if api_base.trim().is_empty() {
                return Err(ReplyError::Config(format!("{section}.api_base is empty")));
            }
            if model.trim().is_empty() {
                return Err(ReplyError::Config(format!("{section}.model is empty")));
            }
        }
        if self.embedding.dimension == Some(0) {
            return Err(ReplyError::Config(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Rewrite relative storage paths so they are relative to `base` instead of the
    /// working directory.
    fn resolve_paths(&mut self, base: &Path) {
        if self.vector_db_path.is_relative() {
            self.vector_db_path = base.join(&self.vector_db_path);
        }
        if let Some(corpus) = self.corpus_path.as_mut() {
            if corpus.is_relative() {
                *corpus = base.join(&*corpus);
            }
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// Relative `vector_db_path` and `corpus_path` values are resolved against the
/// directory that contains the file.
///
/// # Returns
///
/// - `Ok(ReplyConfig)`: The loaded and validated configuration.
/// - `Err(ReplyError)`: The file could not be read, parsed, or failed validation.
pub fn load_config(file: &str) -> Result<ReplyConfig> {
    debug!("Loading config from {}", file);
    let path = Path::new(file);
    let content = fs::read_to_string(path).map_err(|source| ReplyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: ReplyConfig =
        serde_yaml::from_str(&content).map_err(|e| ReplyError::Config(e.to_string()))?;
    config.validate()?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}

/// A starter configuration written by `areply init`.
pub fn starter_config() -> ReplyConfig {
    ReplyConfig {
        embedding: EmbeddingConfig {
            api_key: "CHANGEME".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: None,
        },
        completion: CompletionConfig {
            api_key: "CHANGEME".to_string(),
            api_base: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            timeout_secs: None,
        },
        vector_db_path: PathBuf::from("vector_db"),
        corpus_path: None,
        top_k: DEFAULT_TOP_K,
    }
}
