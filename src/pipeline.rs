//! # Reply pipeline
//!
//! One request, strictly in sequence: search → compose → complete.
//!
//! ```no_run
//! use auto_reply::{config::load_config, index::SearchField, pipeline::ReplyPipeline};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("config.yaml")?;
//! let pipeline = ReplyPipeline::from_config(&config)?;
//! let draft = pipeline
//!     .draft("主旨：測試\n內容：測試內容", SearchField::Incoming, 3)
//!     .await?;
//! println!("{}", draft.text());
//! # Ok(()) }
//! ```

use tracing::{info, warn};

use crate::completion::{ChatCompleter, CompletionClient, CompletionError};
use crate::config::ReplyConfig;
use crate::embedding::OpenAiEmbedder;
use crate::error::{ReplyError, Result};
use crate::index::{DirectoryIndexStore, SearchField};
use crate::prompt::build_prompt;
use crate::search::{SearchResult, Searcher};

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct DraftReply {
    pub results: Vec<SearchResult>,
    pub prompt: String,
    pub reply: std::result::Result<String, CompletionError>,
}

impl DraftReply {
    /// The reply text, or the fixed diagnostic when the completion failed.
    pub fn text(&self) -> &str {
        match &self.reply {
            Ok(reply) => reply,
            Err(e) => e.diagnostic(),
        }
    }
}

pub struct ReplyPipeline {
    searcher: Searcher,
    completer: Box<dyn ChatCompleter>,
}

impl ReplyPipeline {
    pub fn new(searcher: Searcher, completer: Box<dyn ChatCompleter>) -> Self {
        Self {
            searcher,
            completer,
        }
    }

    /// Wire the OpenAI-compatible embedder, the on-disk index store and the
    /// completion client from `config`.
    pub fn from_config(config: &ReplyConfig) -> Result<Self> {
        let searcher = Searcher::new(
            Box::new(OpenAiEmbedder::new(&config.embedding)),
            Box::new(DirectoryIndexStore::new(&config.vector_db_path)),
        )
        .with_expected_dimension(config.embedding.dimension);
        let completer = CompletionClient::new(&config.completion)
            .map_err(|e| ReplyError::Config(format!("unable to build HTTP client: {e}")))?;
        Ok(Self::new(searcher, Box::new(completer)))
    }

    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    /// Draft a reply to `query` from the `top_k` closest cases in `field`.
    ///
    /// An empty or whitespace-only query is rejected with
    /// [`ReplyError::EmptyQuery`] before anything is loaded or called.
    /// Completion failures do not fail the draft; they are kept in
    /// [`DraftReply::reply`].
    pub async fn draft(&self, query: &str, field: SearchField, top_k: usize) -> Result<DraftReply> {
        if query.trim().is_empty() {
            warn!("Refusing to draft a reply to an empty query");
            return Err(ReplyError::EmptyQuery);
        }

        let results = self.searcher.search(query, field, top_k).await?;
        let prompt = build_prompt(query, &results)?;
        let reply = self.completer.complete(&prompt).await;
        match &reply {
            Ok(text) => info!("Drafted reply ({} chars)", text.chars().count()),
            Err(e) => warn!("No reply drafted: {}", e),
        }

        Ok(DraftReply {
            results,
            prompt,
            reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{NO_REPLY_DIAGNOSTIC, UNPARSEABLE_DIAGNOSTIC};
    use crate::search::tests::{FixedEmbedder, FixedStore, neighbor};
    use async_trait::async_trait;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Clone, Default)]
    struct Counters {
        embeds: Arc<AtomicUsize>,
        loads: Arc<AtomicUsize>,
        completions: Arc<AtomicUsize>,
    }

    /// Completer that records prompts and answers with a fixed outcome.
    struct RecordingCompleter {
        outcome: std::result::Result<String, CompletionError>,
        prompts: Arc<Mutex<Vec<String>>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChatCompleter for RecordingCompleter {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.outcome.clone()
        }
    }

    fn pipeline(
        counters: &Counters,
        outcome: std::result::Result<String, CompletionError>,
        prompts: Arc<Mutex<Vec<String>>>,
    ) -> ReplyPipeline {
        let searcher = Searcher::new(
            Box::new(FixedEmbedder {
                vector: vec![0.0, 0.0, 1.0],
                calls: counters.embeds.clone(),
            }),
            Box::new(FixedStore {
                neighbors: vec![neighbor(3, 0.1), neighbor(7, 0.4)],
                loads: counters.loads.clone(),
            }),
        );
        ReplyPipeline::new(
            searcher,
            Box::new(RecordingCompleter {
                outcome,
                prompts,
                calls: counters.completions.clone(),
            }),
        )
    }

    #[tokio::test]
    async fn test_empty_query_touches_nothing() {
        let counters = Counters::default();
        let prompts: Arc<Mutex<Vec<String>>> = Arc::default();
        let pipeline = pipeline(&counters, Ok("unused".to_string()), Arc::clone(&prompts));

        for query in ["", "   \n\t"] {
            let err = pipeline
                .draft(query, SearchField::Incoming, 3)
                .await
                .unwrap_err();
            assert!(matches!(err, ReplyError::EmptyQuery));
        }

        assert_eq!(counters.embeds.load(Ordering::SeqCst), 0);
        assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
        assert_eq!(counters.completions.load(Ordering::SeqCst), 0);
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draft_runs_each_stage_once() {
        let counters = Counters::default();
        let prompts: Arc<Mutex<Vec<String>>> = Arc::default();
        let pipeline = pipeline(&counters, Ok("復貴公司來函。".to_string()), Arc::clone(&prompts));
        let query = "主旨：測試\n內容：測試內容";

        let draft = pipeline.draft(query, SearchField::Incoming, 2).await.unwrap();

        assert_eq!(draft.text(), "復貴公司來函。");
        assert_eq!(draft.results.len(), 2);
        assert_eq!(draft.results[0].a, "回文3");
        assert_eq!(draft.results[1].a, "回文7");
        assert_eq!(counters.embeds.load(Ordering::SeqCst), 1);
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
        assert_eq!(counters.completions.load(Ordering::SeqCst), 1);

        assert_eq!(*prompts.lock().unwrap(), vec![draft.prompt.clone()]);
        assert_eq!(draft.prompt, build_prompt(query, &draft.results).unwrap());
    }

    #[tokio::test]
    async fn test_completion_failure_is_kept_in_draft() {
        let counters = Counters::default();
        let pipeline = pipeline(
            &counters,
            Err(CompletionError::Status(500)),
            Arc::default(),
        );

        let draft = pipeline
            .draft("主旨：測試\n內容：測試內容", SearchField::Reply, 1)
            .await
            .unwrap();

        assert_eq!(draft.reply, Err(CompletionError::Status(500)));
        assert_eq!(draft.text(), NO_REPLY_DIAGNOSTIC);
        assert_eq!(draft.results.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_shows_parse_diagnostic() {
        let counters = Counters::default();
        let pipeline = pipeline(&counters, Err(CompletionError::EmptyReply), Arc::default());

        let draft = pipeline
            .draft("主旨：測試", SearchField::Incoming, 1)
            .await
            .unwrap();

        assert_eq!(draft.text(), UNPARSEABLE_DIAGNOSTIC);
    }
}
