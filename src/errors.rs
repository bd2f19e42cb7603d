use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Title;

/// Error type for consistency checks, record framing, corpus parsing, and IO failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("directory {} contains {actual} entries but should contain {expected}", dir.display())]
    DirectoryCountMismatch {
        dir: PathBuf,
        actual: usize,
        expected: usize,
    },
    #[error(
        "the tokenized articles directory {} contains {tokenized_count} files, but it should contain the same number as {} (which has {source_count} files); was there an error during tokenization?",
        tokenized_dir.display(),
        source_dir.display()
    )]
    TokenizationCountMismatch {
        source_dir: PathBuf,
        source_count: usize,
        tokenized_dir: PathBuf,
        tokenized_count: usize,
    },
    #[error(
        "tokenized articles directory {} contains the expected number of files but article file {file} (title '{title}') was not found",
        dir.display()
    )]
    MissingArticleFile {
        file: String,
        dir: PathBuf,
        title: Title,
    },
    #[error("cannot list directory {}: {source}", dir.display())]
    DirectoryListing {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("record declares {expected} payload bytes but only {actual} are available")]
    TruncatedRecord { expected: usize, actual: usize },
    #[error("corrupt record payload: {0}")]
    CorruptPayload(String),
    #[error("corpus table error: {0}")]
    Csv(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(err) => PipelineError::Io(err),
            _ => PipelineError::Csv(message),
        }
    }
}
