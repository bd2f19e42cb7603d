#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Tokenized article file parsing.
pub mod article;
/// Fixed-size sharding of binary streams.
pub mod chunker;
/// Command-line runner behind the `article-shards` binary.
pub mod cli;
/// Directory layout and pipeline configuration.
pub mod config;
/// Directory file-count checks.
pub mod consistency;
/// Centralized constants for formats, limits, and directory names.
pub mod constants;
/// Corpus cleaning and article materialization.
pub mod corpus;
/// Title content keys.
pub mod hash;
/// End-to-end formatting run.
pub mod pipeline;
/// Length-prefixed tf.Example record codec.
pub mod record;
/// Title lists to binary streams.
pub mod serializer;
/// Split labels and title partitioning.
pub mod splits;
/// External tokenizer invocation.
pub mod tokenize;
/// Filesystem helpers (directory listing, line reading).
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Text normalization helpers.
pub mod utils;
/// Training vocabulary counting.
pub mod vocab;

mod errors;

pub use article::{ArticleFormat, ParsedArticle, parse_lines, read_article_file};
pub use chunker::{ChunkSummary, chunk_all, chunk_split};
pub use config::{DatasetLayout, PipelineConfig};
pub use consistency::{check_entry_count, check_same_count, count_entries};
pub use corpus::{CleanSummary, MaterializeSummary, clean_corpus, materialize_articles};
pub use errors::PipelineError;
pub use hash::content_key;
pub use pipeline::{PipelineSummary, run};
pub use record::{Example, Feature, RecordFrame, RecordReader, decode, encode};
pub use serializer::{SplitJob, SplitSummary, job_for, write_all_splits, write_split};
pub use splits::{PartitionLimits, SplitLabel, TitlePartition, partition_titles};
pub use tokenize::{TokenizerCommand, tokenize_articles};
pub use types::{CellText, ContentKey, FieldName, Title, Token};
pub use vocab::{VocabCounter, read_vocab};
