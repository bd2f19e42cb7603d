//! End-to-end run: count check, tokenize, serialize, chunk.

use tracing::info;

use crate::chunker::{ChunkSummary, chunk_all};
use crate::config::PipelineConfig;
use crate::consistency::check_entry_count;
use crate::errors::PipelineError;
use crate::serializer::{SplitSummary, write_all_splits};
use crate::tokenize::tokenize_articles;
use crate::transport::fs::ensure_dir;

/// Everything a [`run`] produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Article count every directory was checked against.
    pub expected_articles: usize,
    /// Files in the tokenized directory after tokenization.
    pub tokenized: usize,
    /// Per-split stream results, in processing order.
    pub splits: Vec<SplitSummary>,
    /// Per-split shard results, in processing order.
    pub chunks: Vec<ChunkSummary>,
}

/// Run the whole formatting pipeline for `config`.
///
/// The raw articles directory must hold the expected number of files before
/// anything is written.
pub fn run(config: &PipelineConfig) -> Result<PipelineSummary, PipelineError> {
    let config = config.clone().validated()?;
    let layout = &config.layout;
    let expected_articles = config.resolve_expected_articles()?;
    check_entry_count(&layout.articles_dir, expected_articles)?;
    info!(
        expected_articles,
        "articles directory {} verified",
        layout.articles_dir.display()
    );

    ensure_dir(&layout.tokenized_dir)?;
    ensure_dir(&layout.finished_dir)?;

    let tokenized = tokenize_articles(&layout.articles_dir, &layout.tokenized_dir, &config.tokenizer)?;

    let pinned = PipelineConfig {
        expected_articles: Some(expected_articles),
        ..config.clone()
    };
    let splits = write_all_splits(&pinned)?;
    let chunks = chunk_all(&pinned)?;

    Ok(PipelineSummary {
        expected_articles,
        tokenized,
        splits,
        chunks,
    })
}
