//! Main module for the `areply` CLI application.
//!
//! Loads the configuration, parses command-line arguments, and runs the requested
//! command against the reply pipeline.
//!
//! # Examples
//!
//! Drafting a reply from one of the sample documents:
//!
//! ```sh
//! areply samples
//! areply reply --sample 3 --top-k 5 --show-prompt
//! ```
//!
//! Searching historical replies with text from a file:
//!
//! ```sh
//! areply search --field reply --input incoming.txt
//! ```

use auto_reply::{
    commands::{Cli, Commands, QueryArgs, QuerySource},
    config::{self, ReplyConfig},
    config_dir,
    corpus::{DocumentRecord, first_record, load_corpus},
    pipeline::ReplyPipeline,
    search::SearchResult,
};
use clap::Parser;
use crossterm::{
    ExecutableCommand,
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
};
use indicatif::ProgressBar;
use once_cell::sync::OnceCell;
use serde_json::json;
use std::{
    error::Error,
    fs,
    io::{self, IsTerminal, Read, Write, stdout},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, warn};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt().with_writer(io::stderr).init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the `areply` CLI application.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the query cannot be read,
/// or the search itself fails. A failed completion is not an error: its diagnostic is
/// printed in place of the reply.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config_dir()?.join("config.yaml"),
    };

    match cli.command {
        Commands::Init => init(&config_path),
        Commands::Reply { query, show_prompt } => {
            reply(&load_config(&config_path)?, &query, show_prompt).await
        }
        Commands::Search { query } => search(&load_config(&config_path)?, &query).await,
        Commands::Samples => list_samples(&load_config(&config_path)?),
    }
}

fn load_config(path: &Path) -> Result<ReplyConfig, Box<dyn Error>> {
    debug!("Loading config from: {}", path.display());
    Ok(config::load_config(&path.to_string_lossy())?)
}

/// Drafts a reply and prints it, or the completion diagnostic in its place.
async fn reply(
    reply_config: &ReplyConfig,
    query: &QueryArgs,
    show_prompt: bool,
) -> Result<(), Box<dyn Error>> {
    let Some(text) = read_query(query, reply_config)? else {
        return Ok(());
    };
    let pipeline = ReplyPipeline::from_config(reply_config)?;
    let top_k = top_k(query, reply_config);

    let spinner = spinner("Searching similar cases and asking the model...");
    let draft = pipeline.draft(&text, query.field, top_k).await;
    spinner.finish_and_clear();
    let draft = draft?;

    if query.json {
        let output = json!({
            "reply": draft.text(),
            "ok": draft.reply.is_ok(),
            "results": draft.results,
            "prompt": draft.prompt,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    heading("Reply")?;
    println!("{}", draft.text());
    if show_prompt {
        println!();
        heading("Prompt")?;
        println!("{}", draft.prompt);
    }
    Ok(())
}

/// Prints the retrieved exemplars without calling the chat model.
async fn search(reply_config: &ReplyConfig, query: &QueryArgs) -> Result<(), Box<dyn Error>> {
    let Some(text) = read_query(query, reply_config)? else {
        return Ok(());
    };
    let pipeline = ReplyPipeline::from_config(reply_config)?;
    let top_k = top_k(query, reply_config);

    let spinner = spinner("Searching similar cases...");
    let results = pipeline.searcher().search(&text, query.field, top_k).await;
    spinner.finish_and_clear();
    let results = results?;

    if query.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results)?;
    }
    Ok(())
}

fn list_samples(reply_config: &ReplyConfig) -> Result<(), Box<dyn Error>> {
    for (n, record) in samples(reply_config)?.iter().enumerate() {
        println!("{:>3}  {}", n + 1, record.subject);
    }
    Ok(())
}

fn top_k(query: &QueryArgs, config: &ReplyConfig) -> usize {
    query.top_k.map(usize::from).unwrap_or(config.top_k)
}

fn samples(config: &ReplyConfig) -> Result<Vec<DocumentRecord>, Box<dyn Error>> {
    let path = config
        .corpus_path
        .as_deref()
        .ok_or("no corpus_path configured")?;
    Ok(load_corpus(path)?)
}

/// Resolve the query text, or print a warning and return `None` when it is empty.
fn read_query(args: &QueryArgs, config: &ReplyConfig) -> Result<Option<String>, Box<dyn Error>> {
    let source = args.source(!io::stdin().is_terminal(), config.corpus_path.is_some());
    let text = match source {
        Some(QuerySource::Text(query)) => query,
        Some(QuerySource::File(path)) => fs::read_to_string(path)?,
        Some(QuerySource::Sample(n)) => {
            let records = samples(config)?;
            let record = n
                .checked_sub(1)
                .and_then(|i| records.get(i))
                .ok_or_else(|| format!("no sample #{n}; there are {} samples", records.len()))?;
            record.full_text.clone()
        }
        Some(QuerySource::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        Some(QuerySource::FirstSample) => match config.corpus_path.as_deref() {
            Some(path) => {
                info!("Using the first sample document as the query");
                first_record(path)?.map(|record| record.full_text).unwrap_or_default()
            }
            None => String::new(),
        },
        None => String::new(),
    };

    if text.trim().is_empty() {
        warn!("Empty query");
        let mut stdout = stdout();
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        writeln!(stdout, "Please enter the incoming document before drafting a reply.")?;
        stdout.execute(ResetColor)?;
        return Ok(None);
    }
    Ok(Some(text))
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn heading(title: &str) -> io::Result<()> {
    let mut stdout = stdout();
    stdout.execute(SetForegroundColor(Color::Blue))?;
    stdout.execute(SetAttribute(Attribute::Bold))?;
    writeln!(stdout, "{title}")?;
    stdout.execute(SetAttribute(Attribute::Reset))?;
    stdout.execute(ResetColor)?;
    Ok(())
}

fn print_results(results: &[SearchResult]) -> io::Result<()> {
    for (i, result) in results.iter().enumerate() {
        heading(&format!("#{} (distance {:.4})", i + 1, result.distance))?;
        println!("{}", result.q);
        println!("---");
        println!("{}\n", result.a);
    }
    Ok(())
}

/// Writes a starter `config.yaml` unless one already exists.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    if let Some(dir) = config_path.parent() {
        info!("Creating config directory: {}", dir.display());
        fs::create_dir_all(dir)?;
    }

    let starter = config::starter_config();
    let vector_db: PathBuf = config_path
        .parent()
        .map(|dir| dir.join(&starter.vector_db_path))
        .unwrap_or_else(|| starter.vector_db_path.clone());
    fs::create_dir_all(&vector_db)?;

    info!("Creating config file: {}", config_path.display());
    fs::write(config_path, serde_yaml::to_string(&starter)?)?;
    println!(
        "Wrote {}; put index_q.hnsw, meta_q.json, index_a.hnsw and meta_a.json in {}",
        config_path.display(),
        vector_db.display()
    );
    Ok(())
}
