//! Upstream corpus stages: table cleaning and article file materialization.

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::constants::corpus::{COLUMN_HEADLINE, COLUMN_TEXT, COLUMN_TITLE, MAX_SUMMARY_RATIO};
use crate::constants::format::SUMMARY_MARKER;
use crate::errors::PipelineError;
use crate::hash::article_file_name;
use crate::transport::fs::{ensure_dir, ensure_parent_dir};
use crate::types::{CellText, Title};
use crate::utils::reformat_field;

/// Counts reported by [`clean_corpus`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanSummary {
    /// Data rows read from the raw table.
    pub rows_read: usize,
    /// Exact duplicates removed before reformatting.
    pub duplicates_dropped: usize,
    /// Rows removed because a field was empty after reformatting.
    pub empty_dropped: usize,
    /// Rows written to the cleaned table.
    pub rows_written: usize,
}

/// Counts reported by [`materialize_articles`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    /// Data rows read from the cleaned table.
    pub rows_read: usize,
    /// Article files written (and titles appended to the manifest).
    pub articles_written: usize,
    /// Rows rejected by the summary length filter.
    pub rows_skipped: usize,
}

/// One `title, headline, text` row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CorpusRow {
    title: CellText,
    headline: CellText,
    text: CellText,
}

impl CorpusRow {
    fn reformatted(&self) -> Option<Self> {
        let row = Self {
            title: reformat_field(&self.title),
            headline: reformat_field(&self.headline),
            text: reformat_field(&self.text),
        };
        let complete = !row.title.is_empty() && !row.headline.is_empty() && !row.text.is_empty();
        complete.then_some(row)
    }
}

/// Column positions of the three fields the pipeline reads.
struct ColumnIndex {
    title: usize,
    headline: usize,
    text: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord, table: &Path) -> Result<Self, PipelineError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or_else(|| {
                    PipelineError::Csv(format!(
                        "{} has no '{name}' column (found: {})",
                        table.display(),
                        headers.iter().collect::<Vec<_>>().join(", ")
                    ))
                })
        };
        Ok(Self {
            title: find(COLUMN_TITLE)?,
            headline: find(COLUMN_HEADLINE)?,
            text: find(COLUMN_TEXT)?,
        })
    }

    // Short rows read as missing cells.
    fn row(&self, record: &StringRecord) -> CorpusRow {
        let cell = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        CorpusRow {
            title: cell(self.title),
            headline: cell(self.headline),
            text: cell(self.text),
        }
    }
}

fn read_rows(table: &Path) -> Result<Vec<CorpusRow>, PipelineError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(table)?;
    let columns = ColumnIndex::from_headers(reader.headers()?, table)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(columns.row(&record?));
    }
    Ok(rows)
}

/// Clean a raw `title, headline, text` table into `output`.
///
/// Extra columns are dropped, duplicates removed, every cell reformatted,
/// incomplete rows removed, and each title suffixed with `_<n>` where `n`
/// counts earlier rows sharing that title.
pub fn clean_corpus(input: &Path, output: &Path) -> Result<CleanSummary, PipelineError> {
    info!("cleaning corpus table {}", input.display());
    let rows = read_rows(input)?;
    let mut summary = CleanSummary {
        rows_read: rows.len(),
        ..CleanSummary::default()
    };

    let mut seen = HashSet::with_capacity(rows.len());
    let mut unique = Vec::with_capacity(rows.len());
    for row in rows {
        if seen.insert(row.clone()) {
            unique.push(row);
        } else {
            summary.duplicates_dropped += 1;
        }
    }
    drop(seen);

    ensure_parent_dir(output)?;
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_path(output)?;
    writer.write_record([COLUMN_TITLE, COLUMN_HEADLINE, COLUMN_TEXT])?;
    let mut occurrences: HashMap<Title, usize> = HashMap::new();
    for row in &unique {
        let Some(row) = row.reformatted() else {
            summary.empty_dropped += 1;
            continue;
        };
        let seen_before = occurrences.entry(row.title.clone()).or_insert(0);
        let title = format!("{}_{}", row.title, seen_before);
        *seen_before += 1;
        writer.write_record([title.as_str(), row.headline.as_str(), row.text.as_str()])?;
        summary.rows_written += 1;
    }
    writer.flush()?;

    info!(
        rows_read = summary.rows_read,
        duplicates = summary.duplicates_dropped,
        incomplete = summary.empty_dropped,
        rows_written = summary.rows_written,
        "wrote cleaned table {}",
        output.display()
    );
    Ok(summary)
}

/// Length filter: a non-empty summary shorter than 0.75 of its article.
pub fn keeps_summary(summary: &str, article: &str) -> bool {
    let summary_len = summary.chars().count();
    let article_len = article.chars().count();
    summary_len != 0 && (summary_len as f64) < MAX_SUMMARY_RATIO * article_len as f64
}

/// Write one article file per kept row of a cleaned table and list titles in `manifest`.
pub fn materialize_articles(
    cleaned: &Path,
    articles_dir: &Path,
    manifest: &Path,
) -> Result<MaterializeSummary, PipelineError> {
    info!(
        "materializing articles from {} into {}",
        cleaned.display(),
        articles_dir.display()
    );
    let rows = read_rows(cleaned)?;
    ensure_dir(articles_dir)?;
    ensure_parent_dir(manifest)?;

    let mut summary = MaterializeSummary {
        rows_read: rows.len(),
        ..MaterializeSummary::default()
    };
    let mut titles = BufWriter::new(File::create(manifest)?);
    for row in &rows {
        if !keeps_summary(&row.headline, &row.text) {
            debug!(title = %row.title, "skipping row with empty or oversized summary");
            summary.rows_skipped += 1;
            continue;
        }
        titles.write_all(row.title.as_bytes())?;
        titles.write_all(b"\n")?;
        let body = format!("{}\n{SUMMARY_MARKER}\n{}\n", row.text, row.headline);
        fs::write(articles_dir.join(article_file_name(&row.title)), body)?;
        summary.articles_written += 1;
    }
    titles.flush()?;

    info!(
        written = summary.articles_written,
        skipped = summary.rows_skipped,
        "wrote title manifest {}",
        manifest.display()
    );
    Ok(summary)
}
