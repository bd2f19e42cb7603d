use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::article::ArticleFormat;
use crate::consistency::count_entries;
use crate::constants::layout::{
    ARTICLES_DIR, CHUNKS_DIR, FINISHED_FILES_DIR, TITLES_FILENAME, TOKENIZED_ARTICLES_DIR,
    VOCAB_FILENAME,
};
use crate::constants::limits::{CHUNK_SIZE, VOCAB_SIZE};
use crate::errors::PipelineError;
use crate::splits::{PartitionLimits, SplitLabel};
use crate::tokenize::TokenizerCommand;

/// Where every pipeline artifact lives on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    /// Directory holding `titles.txt` and the `all_<split>.txt` lists.
    pub titles_dir: PathBuf,
    /// Raw article files (`<content key>.txt`).
    pub articles_dir: PathBuf,
    /// Tokenized article files, one per raw article, same names.
    pub tokenized_dir: PathBuf,
    /// Streams, vocabulary, and the `chunked/` shard directory.
    pub finished_dir: PathBuf,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self::rooted_at(".")
    }
}

impl DatasetLayout {
    /// Default directory names under `root`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            titles_dir: root.to_path_buf(),
            articles_dir: root.join(ARTICLES_DIR),
            tokenized_dir: root.join(TOKENIZED_ARTICLES_DIR),
            finished_dir: root.join(FINISHED_FILES_DIR),
        }
    }

    /// Title manifest written by the materializer.
    pub fn manifest_path(&self) -> PathBuf {
        self.titles_dir.join(TITLES_FILENAME)
    }

    /// Title list of one split.
    pub fn titles_path(&self, split: SplitLabel) -> PathBuf {
        self.titles_dir.join(split.titles_filename())
    }

    /// Flat binary stream of one split.
    pub fn stream_path(&self, split: SplitLabel) -> PathBuf {
        self.finished_dir.join(split.stream_filename())
    }

    /// Directory receiving shard files.
    pub fn chunks_dir(&self) -> PathBuf {
        self.finished_dir.join(CHUNKS_DIR)
    }

    /// Shard `index` of one split.
    pub fn shard_path(&self, split: SplitLabel, index: usize) -> PathBuf {
        self.chunks_dir().join(split.shard_filename(index))
    }

    /// Vocabulary file.
    pub fn vocab_path(&self) -> PathBuf {
        self.finished_dir.join(VOCAB_FILENAME)
    }
}

/// Top-level pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory layout.
    pub layout: DatasetLayout,
    /// Number of article files every article directory must hold.
    ///
    /// `None` takes the count of `layout.articles_dir` when the run starts.
    pub expected_articles: Option<usize>,
    /// Section markers carried by tokenized article files.
    pub article_format: ArticleFormat,
    /// Maximum vocabulary entries written.
    pub vocab_size: usize,
    /// Records per shard.
    pub chunk_size: usize,
    /// External tokenizer invocation.
    pub tokenizer: TokenizerCommand,
    /// Partition caps and seed.
    pub partition: PartitionLimits,
    /// Chunk the three splits concurrently.
    pub parallel_splits: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: DatasetLayout::default(),
            expected_articles: None,
            article_format: ArticleFormat::default(),
            vocab_size: VOCAB_SIZE,
            chunk_size: CHUNK_SIZE,
            tokenizer: TokenizerCommand::default(),
            partition: PartitionLimits::default(),
            parallel_splits: false,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| {
            PipelineError::Configuration(format!("invalid config {}: {err}", path.display()))
        })?;
        config.validated()
    }

    /// Configured article count, or the current size of `articles_dir`.
    pub fn resolve_expected_articles(&self) -> Result<usize, PipelineError> {
        match self.expected_articles {
            Some(expected) => Ok(expected),
            None => count_entries(&self.layout.articles_dir),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validated(self) -> Result<Self, PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.tokenizer.program.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "tokenizer program must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_paths_follow_naming_contract() {
        let layout = DatasetLayout::rooted_at("/data");
        assert_eq!(layout.articles_dir, PathBuf::from("/data/articles"));
        assert_eq!(layout.tokenized_dir, PathBuf::from("/data/articles_tokenized"));
        assert_eq!(layout.manifest_path(), PathBuf::from("/data/titles.txt"));
        assert_eq!(
            layout.titles_path(SplitLabel::Validation),
            PathBuf::from("/data/all_val.txt")
        );
        assert_eq!(
            layout.stream_path(SplitLabel::Train),
            PathBuf::from("/data/finished_files/train.bin")
        );
        assert_eq!(
            layout.shard_path(SplitLabel::Test, 2),
            PathBuf::from("/data/finished_files/chunked/test_002.bin")
        );
        assert_eq!(layout.vocab_path(), PathBuf::from("/data/finished_files/vocab"));
    }

    #[test]
    fn defaults_match_reference_sizes() {
        let config = PipelineConfig::default();
        assert_eq!(config.vocab_size, 200_000);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.expected_articles, None);
        assert_eq!(config.article_format, ArticleFormat::Plain);
        assert!(!config.parallel_splits);
    }

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "expected_articles": 12,
                "article_format": "with_fact_descriptions",
                "layout": { "finished_dir": "out" },
                "partition": { "test": 2 }
            }"#,
        )
        .unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.expected_articles, Some(12));
        assert_eq!(config.article_format, ArticleFormat::WithFactDescriptions);
        assert_eq!(config.layout.finished_dir, PathBuf::from("out"));
        assert_eq!(config.layout.articles_dir, PathBuf::from("./articles"));
        assert_eq!(config.partition.test, 2);
        assert_eq!(config.partition.validation, 50_000);
        assert_eq!(config.chunk_size, 1000);
    }

    #[test]
    fn expected_articles_falls_back_to_directory_count() {
        let dir = tempdir().unwrap();
        let mut config = PipelineConfig {
            layout: DatasetLayout::rooted_at(dir.path()),
            ..PipelineConfig::default()
        };
        fs::create_dir(&config.layout.articles_dir).unwrap();
        fs::write(config.layout.articles_dir.join("a.txt"), "x").unwrap();
        fs::write(config.layout.articles_dir.join("b.txt"), "y").unwrap();
        assert_eq!(config.resolve_expected_articles().unwrap(), 2);

        config.expected_articles = Some(7);
        assert_eq!(config.resolve_expected_articles().unwrap(), 7);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "chunk_size": 0 }"#).unwrap();
        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("chunk_size")));

        fs::write(&path, "{ not json").unwrap();
        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("invalid config")));
    }
}
