//! Title list to binary stream serialization.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{error, info};

use crate::article::{ArticleFormat, read_article_file};
use crate::config::{DatasetLayout, PipelineConfig};
use crate::consistency::{check_entry_count, check_same_count};
use crate::constants::format::{FIELD_ABSTRACT, FIELD_ARTICLE};
use crate::constants::layout::ALL_SPLITS;
use crate::constants::limits::{PROGRESS_EVERY, VOCAB_SIZE};
use crate::errors::PipelineError;
use crate::hash::article_file_name;
use crate::record::write_record;
use crate::splits::SplitLabel;
use crate::transport::fs::{ensure_parent_dir, read_stripped_lines};
use crate::vocab::VocabCounter;

/// One serialization pass over a split's title list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitJob {
    /// Split to serialize.
    pub split: SplitLabel,
    /// Section markers expected in the tokenized files.
    pub format: ArticleFormat,
    /// Article count the tokenized directory must hold.
    ///
    /// `None` compares the tokenized directory against `articles_dir` instead,
    /// and only once a title turns out to be missing.
    pub expected_articles: Option<usize>,
    /// Vocabulary cap; `None` skips vocabulary accumulation.
    pub vocab_limit: Option<usize>,
}

impl SplitJob {
    /// Plain-format job; the train split builds a full-size vocabulary.
    pub fn new(split: SplitLabel) -> Self {
        Self {
            split,
            format: ArticleFormat::default(),
            expected_articles: None,
            vocab_limit: split.builds_vocab().then_some(VOCAB_SIZE),
        }
    }

    /// Pin the article count checked when a tokenized file is missing.
    pub fn with_expected_articles(mut self, expected_articles: usize) -> Self {
        self.expected_articles = Some(expected_articles);
        self
    }

    /// Set the article format.
    pub fn with_format(mut self, format: ArticleFormat) -> Self {
        self.format = format;
        self
    }

    /// Override vocabulary accumulation.
    pub fn with_vocab_limit(mut self, vocab_limit: Option<usize>) -> Self {
        self.vocab_limit = vocab_limit;
        self
    }
}

/// Result of one [`write_split`] pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitSummary {
    /// Split that was serialized.
    pub split: SplitLabel,
    /// Stream file written.
    pub stream_path: PathBuf,
    /// Records appended.
    pub records: usize,
    /// Stream size in bytes.
    pub bytes: usize,
    /// Vocabulary entries written, when the job built one.
    pub vocab_entries: Option<usize>,
}

/// Serialize every title of a split into `<finished_dir>/<split>.bin`.
pub fn write_split(job: &SplitJob, layout: &DatasetLayout) -> Result<SplitSummary, PipelineError> {
    let titles_path = layout.titles_path(job.split);
    let stream_path = layout.stream_path(job.split);
    info!(
        "making binary file for titles listed in {}...",
        titles_path.display()
    );
    let titles: Vec<String> = read_stripped_lines(&titles_path)?
        .into_iter()
        .filter(|title| !title.is_empty())
        .collect();
    let total = titles.len();

    let mut vocab = job.vocab_limit.map(|_| VocabCounter::new());
    let mut records = 0;
    let mut bytes = 0;
    ensure_parent_dir(&stream_path)?;
    {
        let mut writer = BufWriter::new(File::create(&stream_path)?);
        for (idx, title) in titles.iter().enumerate() {
            if idx % PROGRESS_EVERY == 0 {
                info!(
                    split = %job.split,
                    "writing title {idx} of {total}; {:.2} percent done",
                    percent(idx, total)
                );
            }
            let file = article_file_name(title);
            let path = layout.tokenized_dir.join(&file);
            if !path.is_file() {
                error!(
                    "couldn't find tokenized article file {file} for title '{title}' in {}; \
                     was there an error during tokenization?",
                    layout.tokenized_dir.display()
                );
                match job.expected_articles {
                    Some(expected) => check_entry_count(&layout.tokenized_dir, expected)?,
                    None => {
                        check_same_count(&layout.articles_dir, &layout.tokenized_dir)?;
                    }
                }
                return Err(PipelineError::MissingArticleFile {
                    file,
                    dir: layout.tokenized_dir.clone(),
                    title: title.clone(),
                });
            }

            let parsed = read_article_file(&path, job.format)?;
            let example = parsed.to_example();
            bytes += write_record(&mut writer, &example)?;
            records += 1;

            if let Some(vocab) = vocab.as_mut() {
                for field in [FIELD_ARTICLE, FIELD_ABSTRACT] {
                    if let Some(text) = example.text(field) {
                        vocab.update_from_text(text);
                    }
                }
            }
        }
        writer.flush()?;
    }
    info!("finished writing file {}", stream_path.display());

    let vocab_entries = match (vocab, job.vocab_limit) {
        (Some(vocab), Some(limit)) => {
            let vocab_path = layout.vocab_path();
            info!("writing vocab file...");
            let written = vocab.write_to(&vocab_path, limit)?;
            info!(entries = written, "finished writing vocab file {}", vocab_path.display());
            Some(written)
        }
        _ => None,
    };

    Ok(SplitSummary {
        split: job.split,
        stream_path,
        records,
        bytes,
        vocab_entries,
    })
}

/// Job for `split` carrying the config's format, vocabulary size, and expected count.
pub fn job_for(config: &PipelineConfig, split: SplitLabel) -> SplitJob {
    SplitJob {
        expected_articles: config.expected_articles,
        ..SplitJob::new(split)
            .with_format(config.article_format)
            .with_vocab_limit(split.builds_vocab().then_some(config.vocab_size))
    }
}

/// Serialize train (with vocabulary), test, and val in that order.
pub fn write_all_splits(config: &PipelineConfig) -> Result<Vec<SplitSummary>, PipelineError> {
    ALL_SPLITS
        .iter()
        .map(|&split| write_split(&job_for(config, split), &config.layout))
        .collect()
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}
