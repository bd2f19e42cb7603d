use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::constants::corpus::{DEFAULT_PARTITION_SEED, NUM_TEST_LIMIT, NUM_VAL_LIMIT};
use crate::constants::layout::{ALL_SPLITS, BIN_EXTENSION};
use crate::errors::PipelineError;
use crate::transport::fs::{ensure_dir, read_stripped_lines};
use crate::types::Title;

/// Logical dataset partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitLabel {
    /// Training split.
    Train,
    /// Validation split (`val` on disk).
    #[serde(rename = "val")]
    Validation,
    /// Test split.
    Test,
}

impl SplitLabel {
    /// On-disk name used in every filename derived from this split.
    pub fn as_str(self) -> &'static str {
        match self {
            SplitLabel::Train => "train",
            SplitLabel::Validation => "val",
            SplitLabel::Test => "test",
        }
    }

    /// Title list filename (`all_<split>.txt`).
    pub fn titles_filename(self) -> String {
        format!("all_{}.txt", self.as_str())
    }

    /// Flat binary stream filename (`<split>.bin`).
    pub fn stream_filename(self) -> String {
        format!("{}.{}", self.as_str(), BIN_EXTENSION)
    }

    /// Shard filename (`<split>_<NNN>.bin`).
    pub fn shard_filename(self, index: usize) -> String {
        format!("{}_{:03}.{}", self.as_str(), index, BIN_EXTENSION)
    }

    /// Only the train split feeds the vocabulary.
    pub fn builds_vocab(self) -> bool {
        self == SplitLabel::Train
    }
}

impl fmt::Display for SplitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitLabel {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(SplitLabel::Train),
            "val" | "validation" => Ok(SplitLabel::Validation),
            "test" => Ok(SplitLabel::Test),
            other => Err(PipelineError::Configuration(format!(
                "unknown split '{other}' (expected train, val, or test)"
            ))),
        }
    }
}

/// Size caps for the two bounded partitions; train receives the remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionLimits {
    /// Maximum number of test titles.
    pub test: usize,
    /// Maximum number of validation titles.
    pub validation: usize,
    /// Shuffle seed.
    pub seed: u64,
}

impl Default for PartitionLimits {
    fn default() -> Self {
        Self {
            test: NUM_TEST_LIMIT,
            validation: NUM_VAL_LIMIT,
            seed: DEFAULT_PARTITION_SEED,
        }
    }
}

/// Three disjoint title lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TitlePartition {
    /// Training titles.
    pub train: Vec<Title>,
    /// Validation titles.
    pub validation: Vec<Title>,
    /// Test titles.
    pub test: Vec<Title>,
}

impl TitlePartition {
    /// Titles assigned to `label`.
    pub fn titles(&self, label: SplitLabel) -> &[Title] {
        match label {
            SplitLabel::Train => &self.train,
            SplitLabel::Validation => &self.validation,
            SplitLabel::Test => &self.test,
        }
    }

    /// Total number of titles across all partitions.
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    /// True when no titles were partitioned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shuffle `titles` from the seed, then fill test, then validation, then train.
pub fn partition_titles(mut titles: Vec<Title>, limits: PartitionLimits) -> TitlePartition {
    let mut rng = StdRng::seed_from_u64(limits.seed);
    titles.shuffle(&mut rng);

    let test_end = limits.test.min(titles.len());
    let val_end = (test_end + limits.validation).min(titles.len());
    let train = titles.split_off(val_end);
    let validation = titles.split_off(test_end);
    TitlePartition {
        train,
        validation,
        test: titles,
    }
}

/// Read a manifest, partition it, and write `all_<split>.txt` lists into `out_dir`.
pub fn partition_manifest(
    manifest: &Path,
    out_dir: &Path,
    limits: PartitionLimits,
) -> Result<TitlePartition, PipelineError> {
    let titles = read_stripped_lines(manifest)?
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();
    let partition = partition_titles(titles, limits);
    write_partition(&partition, out_dir)?;
    info!(
        train = partition.train.len(),
        val = partition.validation.len(),
        test = partition.test.len(),
        "partitioned {}",
        manifest.display()
    );
    Ok(partition)
}

/// Write one title list per split into `out_dir`, returning the written paths.
pub fn write_partition(
    partition: &TitlePartition,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, PipelineError> {
    ensure_dir(out_dir)?;
    let mut written = Vec::with_capacity(ALL_SPLITS.len());
    for label in ALL_SPLITS {
        let path = out_dir.join(label.titles_filename());
        let mut writer = BufWriter::new(File::create(&path)?);
        for title in partition.titles(label) {
            writer.write_all(title.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn titles(count: usize) -> Vec<Title> {
        (0..count).map(|idx| format!("title_{idx}")).collect()
    }

    #[test]
    fn split_names_and_filenames() {
        assert_eq!(SplitLabel::Validation.as_str(), "val");
        assert_eq!(SplitLabel::Train.titles_filename(), "all_train.txt");
        assert_eq!(SplitLabel::Test.stream_filename(), "test.bin");
        assert_eq!(SplitLabel::Validation.shard_filename(7), "val_007.bin");
        assert_eq!(SplitLabel::Train.shard_filename(1234), "train_1234.bin");
        assert!(SplitLabel::Train.builds_vocab());
        assert!(!SplitLabel::Test.builds_vocab());
    }

    #[test]
    fn split_label_parses_aliases_and_rejects_unknown() {
        assert_eq!("val".parse::<SplitLabel>().unwrap(), SplitLabel::Validation);
        assert_eq!(
            " Validation ".parse::<SplitLabel>().unwrap(),
            SplitLabel::Validation
        );
        assert_eq!("TRAIN".parse::<SplitLabel>().unwrap(), SplitLabel::Train);
        let err = "dev".parse::<SplitLabel>().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref msg) if msg.contains("dev")));
    }

    #[test]
    fn split_label_serializes_with_on_disk_names() {
        let json = serde_json::to_string(&SplitLabel::Validation).unwrap();
        assert_eq!(json, "\"val\"");
        let parsed: SplitLabel = serde_json::from_str("\"train\"").unwrap();
        assert_eq!(parsed, SplitLabel::Train);
    }

    #[test]
    fn partition_caps_test_and_validation_and_keeps_titles_disjoint() {
        let limits = PartitionLimits {
            test: 3,
            validation: 4,
            seed: 9,
        };
        let partition = partition_titles(titles(20), limits);
        assert_eq!(partition.test.len(), 3);
        assert_eq!(partition.validation.len(), 4);
        assert_eq!(partition.train.len(), 13);

        let mut seen = HashSet::new();
        for label in ALL_SPLITS {
            for title in partition.titles(label) {
                assert!(seen.insert(title.clone()), "duplicate title {title}");
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn partition_fills_test_first_when_corpus_is_small() {
        let limits = PartitionLimits {
            test: 5,
            validation: 5,
            seed: 1,
        };
        let partition = partition_titles(titles(7), limits);
        assert_eq!(partition.test.len(), 5);
        assert_eq!(partition.validation.len(), 2);
        assert!(partition.train.is_empty());
        assert_eq!(partition.len(), 7);
    }

    #[test]
    fn partition_is_deterministic_per_seed() {
        let limits = PartitionLimits {
            test: 4,
            validation: 4,
            seed: 77,
        };
        let first = partition_titles(titles(50), limits);
        let second = partition_titles(titles(50), limits);
        assert_eq!(first, second);

        let other = partition_titles(
            titles(50),
            PartitionLimits {
                seed: 78,
                ..limits
            },
        );
        assert_ne!(first, other);
    }

    #[test]
    fn partition_manifest_writes_three_lists() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("titles.txt");
        std::fs::write(&manifest, "a\nb\n\nc\nd\ne\n").unwrap();
        let limits = PartitionLimits {
            test: 1,
            validation: 1,
            seed: 3,
        };
        let partition = partition_manifest(&manifest, dir.path(), limits).unwrap();
        assert_eq!(partition.len(), 5);

        let train = std::fs::read_to_string(dir.path().join("all_train.txt")).unwrap();
        let val = std::fs::read_to_string(dir.path().join("all_val.txt")).unwrap();
        let test = std::fs::read_to_string(dir.path().join("all_test.txt")).unwrap();
        assert_eq!(train.lines().count(), 3);
        assert_eq!(val.lines().count(), 1);
        assert_eq!(test.lines().count(), 1);
        assert!(train.ends_with('\n'));
    }
}
