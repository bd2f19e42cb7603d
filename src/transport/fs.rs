use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::PipelineError;

/// Flat (non-recursive) view of a directory's direct entries.
pub struct FileStream {
    root: PathBuf,
}

impl FileStream {
    /// Create a stream rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Every direct entry (files, directories, links), sorted by path.
    pub fn entries(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let walker = WalkDir::new(&self.root).min_depth(1).max_depth(1);
        let mut paths = Vec::new();
        for entry in walker {
            paths.push(entry.map_err(|err| walk_err(&self.root, err))?.into_path());
        }
        paths.sort();
        Ok(paths)
    }
}

/// Read a UTF-8 text file as lines with surrounding whitespace removed.
pub fn read_stripped_lines(path: &Path) -> Result<Vec<String>, PipelineError> {
    let reader = BufReader::new(File::open(path)?);
    reader
        .lines()
        .map(|line| Ok(line?.trim().to_string()))
        .collect()
}

/// Create `dir` (and parents) when it does not exist yet.
pub fn ensure_dir(dir: &Path) -> Result<(), PipelineError> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Create the parent directory of `path` when needed.
pub fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn walk_err(root: &Path, err: walkdir::Error) -> PipelineError {
    let source = match err.into_io_error() {
        Some(io) => io,
        None => std::io::Error::other("filesystem loop"),
    };
    PipelineError::DirectoryListing {
        dir: root.to_path_buf(),
        source,
    }
}
