//! Directory file-count invariants.

use std::path::Path;
use tracing::debug;

use crate::errors::PipelineError;
use crate::transport::fs::FileStream;

/// Number of direct entries in `dir`.
pub fn count_entries(dir: &Path) -> Result<usize, PipelineError> {
    Ok(FileStream::new(dir).entries()?.len())
}

/// Fail with [`PipelineError::DirectoryCountMismatch`] unless `dir` holds `expected` entries.
pub fn check_entry_count(dir: &Path, expected: usize) -> Result<(), PipelineError> {
    let actual = count_entries(dir)?;
    if actual != expected {
        return Err(PipelineError::DirectoryCountMismatch {
            dir: dir.to_path_buf(),
            actual,
            expected,
        });
    }
    debug!(dir = %dir.display(), count = actual, "directory count verified");
    Ok(())
}

/// Fail with [`PipelineError::TokenizationCountMismatch`] unless both directories
/// hold the same number of entries. Returns that count.
pub fn check_same_count(source_dir: &Path, tokenized_dir: &Path) -> Result<usize, PipelineError> {
    let source_count = count_entries(source_dir)?;
    let tokenized_count = count_entries(tokenized_dir)?;
    if source_count != tokenized_count {
        return Err(PipelineError::TokenizationCountMismatch {
            source_dir: source_dir.to_path_buf(),
            source_count,
            tokenized_dir: tokenized_dir.to_path_buf(),
            tokenized_count,
        });
    }
    Ok(source_count)
}
