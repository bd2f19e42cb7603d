//! External tokenizer invocation.
//!
//! The tokenizer's exit status is logged but not trusted: success is decided
//! solely by the file-count comparison that always runs afterwards.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

use crate::consistency::check_same_count;
use crate::constants::layout::TOKENIZER_MAPPING_FILENAME;
use crate::constants::tokenizer::{DEFAULT_ARGS, DEFAULT_PROGRAM};
use crate::errors::PipelineError;
use crate::transport::fs::{FileStream, ensure_dir};

/// Program and leading arguments; the IO mapping file path is appended last.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the mapping file path.
    pub args: Vec<String>,
}

impl Default for TokenizerCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

/// Removes the mapping file when dropped.
struct MappingFile {
    path: PathBuf,
}

impl MappingFile {
    fn write(path: PathBuf, pairs: &[(PathBuf, PathBuf)]) -> Result<Self, PipelineError> {
        let guard = Self { path };
        let mut writer = BufWriter::new(File::create(&guard.path)?);
        for (source, target) in pairs {
            writeln!(writer, "{} \t {}", source.display(), target.display())?;
        }
        writer.flush()?;
        Ok(guard)
    }
}

impl Drop for MappingFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "could not remove tokenizer mapping file");
        }
    }
}

/// Tokenize every file of `articles_dir` into `tokenized_dir` (same names).
///
/// Returns the verified number of tokenized files.
pub fn tokenize_articles(
    articles_dir: &Path,
    tokenized_dir: &Path,
    command: &TokenizerCommand,
) -> Result<usize, PipelineError> {
    info!(
        "preparing to tokenize {} to {}",
        articles_dir.display(),
        tokenized_dir.display()
    );
    ensure_dir(tokenized_dir)?;
    let pairs: Vec<(PathBuf, PathBuf)> = FileStream::new(articles_dir)
        .entries()?
        .into_iter()
        .filter_map(|source| {
            let name = source.file_name()?.to_owned();
            Some((source, tokenized_dir.join(name)))
        })
        .collect();

    {
        let mapping = MappingFile::write(mapping_path_for(tokenized_dir), &pairs)?;
        info!(
            files = pairs.len(),
            program = %command.program,
            "running external tokenizer"
        );
        let status = Command::new(&command.program)
            .args(&command.args)
            .arg(&mapping.path)
            .status()?;
        if !status.success() {
            warn!(%status, "tokenizer exited unsuccessfully; relying on file-count check");
        }
    }

    let count = check_same_count(articles_dir, tokenized_dir)?;
    info!(
        count,
        "successfully finished tokenizing {} to {}",
        articles_dir.display(),
        tokenized_dir.display()
    );
    Ok(count)
}

fn mapping_path_for(tokenized_dir: &Path) -> PathBuf {
    let parent = tokenized_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parent.join(TOKENIZER_MAPPING_FILENAME)
}
