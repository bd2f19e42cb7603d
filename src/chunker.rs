//! Fixed-size sharding of binary streams.

use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{DatasetLayout, PipelineConfig};
use crate::constants::layout::ALL_SPLITS;
use crate::errors::PipelineError;
use crate::record::{RecordFrame, read_frame};
use crate::splits::SplitLabel;
use crate::transport::fs::{FileStream, ensure_dir};

/// Shards written for one split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkSummary {
    /// Split that was chunked.
    pub split: SplitLabel,
    /// Shard files in index order.
    pub shards: Vec<PathBuf>,
    /// Records copied across all shards.
    pub records: usize,
}

/// Split `<split>.bin` into shards of at most `chunk_size` records.
///
/// Frames are copied verbatim. Shards are only written when non-empty, and
/// shards of the split left over from an earlier run are removed first.
pub fn chunk_split(
    split: SplitLabel,
    layout: &DatasetLayout,
    chunk_size: usize,
) -> Result<ChunkSummary, PipelineError> {
    if chunk_size == 0 {
        return Err(PipelineError::Configuration(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    let stream_path = layout.stream_path(split);
    let mut reader = BufReader::new(File::open(&stream_path)?);
    let chunks_dir = layout.chunks_dir();
    ensure_dir(&chunks_dir)?;
    remove_stale_shards(split, &chunks_dir)?;

    let mut shards = Vec::new();
    let mut records = 0;
    let mut batch: Vec<RecordFrame> = Vec::with_capacity(chunk_size);
    loop {
        batch.clear();
        while batch.len() < chunk_size {
            match read_frame(&mut reader)? {
                Some(frame) => batch.push(frame),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }

        let shard_path = layout.shard_path(split, shards.len());
        let mut writer = BufWriter::new(File::create(&shard_path)?);
        for frame in &batch {
            frame.write_to(&mut writer)?;
        }
        writer.flush()?;
        records += batch.len();
        shards.push(shard_path);

        if batch.len() < chunk_size {
            break;
        }
    }

    info!(
        split = %split,
        shards = shards.len(),
        records,
        "chunked {}",
        stream_path.display()
    );
    Ok(ChunkSummary {
        split,
        shards,
        records,
    })
}

/// Index encoded in a `<split>_<NNN>.bin` shard filename.
fn shard_index(split: SplitLabel, file_name: &str) -> Option<usize> {
    let digits = file_name
        .strip_prefix(split.as_str())?
        .strip_prefix('_')?
        .strip_suffix(".bin")?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn remove_stale_shards(split: SplitLabel, chunks_dir: &Path) -> Result<usize, PipelineError> {
    let mut removed = 0;
    for path in FileStream::new(chunks_dir).entries()? {
        let is_shard = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| shard_index(split, name))
            .is_some();
        if is_shard && path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(split = %split, removed, "removed shards from a previous run");
    }
    Ok(removed)
}

/// Chunk every split into `<finished_dir>/chunked`.
pub fn chunk_all(config: &PipelineConfig) -> Result<Vec<ChunkSummary>, PipelineError> {
    let layout = &config.layout;
    ensure_dir(&layout.chunks_dir())?;
    let summaries = if config.parallel_splits {
        ALL_SPLITS
            .par_iter()
            .map(|&split| chunk_split(split, layout, config.chunk_size))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        ALL_SPLITS
            .iter()
            .map(|&split| chunk_split(split, layout, config.chunk_size))
            .collect::<Result<Vec<_>, _>>()?
    };
    info!("saved chunked data in {}", layout.chunks_dir().display());
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Example, write_record};
    use std::fs;
    use tempfile::tempdir;

    fn write_stream(layout: &DatasetLayout, split: SplitLabel, count: usize) -> Vec<u8> {
        fs::create_dir_all(&layout.finished_dir).unwrap();
        let mut bytes = Vec::new();
        for idx in 0..count {
            let example = Example::new()
                .with_text("article", &format!("article {idx}"))
                .with_text("abstract", "<s> s . </s>");
            write_record(&mut bytes, &example).unwrap();
        }
        fs::write(layout.stream_path(split), &bytes).unwrap();
        bytes
    }

    fn count_frames(path: &std::path::Path) -> usize {
        let mut reader = BufReader::new(File::open(path).unwrap());
        let mut count = 0;
        while read_frame(&mut reader).unwrap().is_some() {
            count += 1;
        }
        count
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_shard() {
        let dir = tempdir().unwrap();
        let layout = DatasetLayout::rooted_at(dir.path());
        write_stream(&layout, SplitLabel::Test, 6);

        let summary = chunk_split(SplitLabel::Test, &layout, 3).unwrap();
        assert_eq!(summary.shards.len(), 2);
        assert_eq!(summary.records, 6);
        assert!(!layout.shard_path(SplitLabel::Test, 2).exists());
    }

    #[test]
    fn remainder_lands_in_last_shard() {
        let dir = tempdir().unwrap();
        let layout = DatasetLayout::rooted_at(dir.path());
        write_stream(&layout, SplitLabel::Validation, 7);

        let summary = chunk_split(SplitLabel::Validation, &layout, 3).unwrap();
        let sizes: Vec<usize> = summary.shards.iter().map(|p| count_frames(p)).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(summary.shards[2].ends_with("chunked/val_002.bin"));
    }

    #[test]
    fn empty_stream_writes_no_shards() {
        let dir = tempdir().unwrap();
        let layout = DatasetLayout::rooted_at(dir.path());
        write_stream(&layout, SplitLabel::Train, 0);

        let summary = chunk_split(SplitLabel::Train, &layout, 1000).unwrap();
        assert!(summary.shards.is_empty());
        assert_eq!(fs::read_dir(layout.chunks_dir()).unwrap().count(), 0);
    }

    #[test]
    fn missing_stream_is_an_io_error() {
        let dir = tempdir().unwrap();
        let layout = DatasetLayout::rooted_at(dir.path());
        let err = chunk_split(SplitLabel::Train, &layout, 10).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn rerun_with_fewer_records_leaves_no_stale_shards() {
        let dir = tempdir().unwrap();
        let layout = DatasetLayout::rooted_at(dir.path());
        write_stream(&layout, SplitLabel::Train, 5);
        write_stream(&layout, SplitLabel::Test, 3);
        assert_eq!(chunk_split(SplitLabel::Train, &layout, 2).unwrap().shards.len(), 3);
        assert_eq!(chunk_split(SplitLabel::Test, &layout, 2).unwrap().shards.len(), 2);

        let stream = write_stream(&layout, SplitLabel::Train, 2);
        let summary = chunk_split(SplitLabel::Train, &layout, 2).unwrap();
        assert_eq!(summary.shards, vec![layout.shard_path(SplitLabel::Train, 0)]);

        let mut names: Vec<String> = fs::read_dir(layout.chunks_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["test_000.bin", "test_001.bin", "train_000.bin"]);
        assert_eq!(fs::read(&summary.shards[0]).unwrap(), stream);
    }

    #[test]
    fn shard_index_only_matches_own_split() {
        assert_eq!(shard_index(SplitLabel::Train, "train_007.bin"), Some(7));
        assert_eq!(shard_index(SplitLabel::Train, "train_1234.bin"), Some(1234));
        assert_eq!(shard_index(SplitLabel::Train, "test_000.bin"), None);
        assert_eq!(shard_index(SplitLabel::Train, "train.bin"), None);
        assert_eq!(shard_index(SplitLabel::Train, "train_00a.bin"), None);
        assert_eq!(shard_index(SplitLabel::Validation, "val_000.bin"), Some(0));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let dir = tempdir().unwrap();
        let layout = DatasetLayout::rooted_at(dir.path());
        write_stream(&layout, SplitLabel::Train, 1);
        let err = chunk_split(SplitLabel::Train, &layout, 0).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn parallel_and_sequential_chunking_agree() {
        let dir = tempdir().unwrap();
        let mut config = PipelineConfig {
            layout: DatasetLayout::rooted_at(dir.path()),
            chunk_size: 2,
            ..PipelineConfig::default()
        };
        for (split, count) in [
            (SplitLabel::Train, 5),
            (SplitLabel::Test, 2),
            (SplitLabel::Validation, 1),
        ] {
            write_stream(&config.layout, split, count);
        }

        let sequential = chunk_all(&config).unwrap();
        config.parallel_splits = true;
        let parallel = chunk_all(&config).unwrap();
        assert_eq!(sequential, parallel);
        let shard_counts: Vec<usize> = parallel.iter().map(|s| s.shards.len()).collect();
        assert_eq!(shard_counts, vec![3, 1, 1]);
    }
}
