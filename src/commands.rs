//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use auto_reply::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! if let Commands::Samples = cli.command {
//!     // list the sample documents
//! }
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::index::SearchField;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Path to the YAML configuration file. Defaults to `config.yaml` in the
    /// platform configuration directory.
    #[arg(long, short = 'c', global = true, env = "AREPLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the incoming document comes from and which cases to retrieve for it.
///
/// Query sources are tried in order: the positional argument, `--input`,
/// `--sample`, piped standard input, then the first sample of the configured
/// corpus. See [`QueryArgs::source`].
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// The incoming document text.
    pub query: Option<String>,

    /// Read the incoming document from a file.
    #[arg(long, short = 'i', conflicts_with = "query")]
    pub input: Option<PathBuf>,

    /// Use the sample document with this number (see `areply samples`).
    #[arg(long, short = 's', conflicts_with_all = ["query", "input"])]
    pub sample: Option<usize>,

    /// Which historical corpus to search.
    #[arg(long, short = 'f', value_enum, default_value_t = SearchField::Incoming)]
    pub field: SearchField,

    /// Number of similar cases to retrieve. Defaults to `top_k` from the config.
    #[arg(long, short = 'k', value_parser = clap::value_parser!(u16).range(1..=10))]
    pub top_k: Option<u16>,

    /// Print machine-readable JSON instead of formatted text.
    #[arg(long)]
    pub json: bool,
}

/// The resolved origin of the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    Text(String),
    File(PathBuf),
    /// 1-based sample number.
    Sample(usize),
    Stdin,
    FirstSample,
}

impl QueryArgs {
    /// Pick the query source, or `None` when there is nothing to read.
    ///
    /// Piped input outranks the corpus default so `cat letter.txt | areply reply`
    /// always answers the piped letter.
    pub fn source(&self, stdin_piped: bool, has_corpus: bool) -> Option<QuerySource> {
        if let Some(query) = &self.query {
            Some(QuerySource::Text(query.clone()))
        } else if let Some(path) = &self.input {
            Some(QuerySource::File(path.clone()))
        } else if let Some(n) = self.sample {
            Some(QuerySource::Sample(n))
        } else if stdin_piped {
            Some(QuerySource::Stdin)
        } else if has_corpus {
            Some(QuerySource::FirstSample)
        } else {
            None
        }
    }
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Draft a reply to an incoming document.
    #[clap(name = "reply", alias = "r")]
    Reply {
        #[command(flatten)]
        query: QueryArgs,

        /// Also print the prompt sent to the model.
        #[arg(long)]
        show_prompt: bool,
    },

    /// Show the most similar historical cases without drafting a reply.
    #[clap(name = "search", alias = "s")]
    Search {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// List the sample incoming documents from the configured corpus.
    Samples,

    /// Write a starter configuration file.
    Init,
}
