//! Token frequency accumulation for the train split.

use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::constants::format::{SENTENCE_END, SENTENCE_START};
use crate::errors::PipelineError;
use crate::transport::fs::ensure_parent_dir;
use crate::types::Token;

/// Insertion-ordered token counter.
#[derive(Clone, Debug, Default)]
pub struct VocabCounter {
    counts: IndexMap<Token, u64>,
}

impl VocabCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the space-separated tokens of `text`.
    ///
    /// Tokens are trimmed; empty tokens and sentence markers are skipped.
    pub fn update_from_text(&mut self, text: &str) {
        for token in text.split(' ') {
            let token = token.trim();
            if token.is_empty() || token == SENTENCE_START || token == SENTENCE_END {
                continue;
            }
            self.add(token, 1);
        }
    }

    /// Add `count` occurrences of `token`.
    pub fn add(&mut self, token: &str, count: u64) {
        match self.counts.get_mut(token) {
            Some(existing) => *existing += count,
            None => {
                self.counts.insert(token.to_string(), count);
            }
        }
    }

    /// Occurrences of `token` seen so far.
    pub fn count(&self, token: &str) -> u64 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when nothing has been counted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Up to `limit` entries by descending count; ties keep first-seen order.
    pub fn most_common(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self
            .counts
            .iter()
            .map(|(token, count)| (token.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(limit);
        entries
    }

    /// Write `token count` lines for the `limit` most common tokens.
    pub fn write_to(&self, path: &Path, limit: usize) -> Result<usize, PipelineError> {
        ensure_parent_dir(path)?;
        let entries = self.most_common(limit);
        let mut writer = BufWriter::new(File::create(path)?);
        for (token, count) in &entries {
            writeln!(writer, "{token} {count}")?;
        }
        writer.flush()?;
        Ok(entries.len())
    }
}

/// Read a vocabulary file back as `(token, count)` pairs in file order.
pub fn read_vocab(path: &Path) -> Result<Vec<(Token, u64)>, PipelineError> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (token, count) = line.rsplit_once(' ').ok_or_else(|| {
            PipelineError::Configuration(format!(
                "vocab line {} is not '<token> <count>': {line:?}",
                idx + 1
            ))
        })?;
        let count = count.parse::<u64>().map_err(|_| {
            PipelineError::Configuration(format!(
                "vocab line {} has a non-numeric count: {line:?}",
                idx + 1
            ))
        })?;
        entries.push((token.to_string(), count));
    }
    Ok(entries)
}
