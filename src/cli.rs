use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind};
use tracing_subscriber::EnvFilter;

use crate::article::ArticleFormat;
use crate::chunker::{ChunkSummary, chunk_all, chunk_split};
use crate::config::{DatasetLayout, PipelineConfig};
use crate::constants::layout::ALL_SPLITS;
use crate::corpus::{clean_corpus, materialize_articles};
use crate::pipeline::run;
use crate::serializer::{SplitSummary, job_for, write_all_splits, write_split};
use crate::splits::{SplitLabel, partition_manifest};
use crate::tokenize::tokenize_articles;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SplitArg {
    Train,
    #[value(alias = "val")]
    Validation,
    Test,
}

impl From<SplitArg> for SplitLabel {
    fn from(value: SplitArg) -> Self {
        match value {
            SplitArg::Train => SplitLabel::Train,
            SplitArg::Validation => SplitLabel::Validation,
            SplitArg::Test => SplitLabel::Test,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "article-shards",
    disable_help_subcommand = true,
    about = "Format a how-to article corpus into tf.Example shards",
    long_about = "Clean and materialize a how-to article corpus, partition its titles, tokenize the article files, serialize each split into a length-prefixed tf.Example stream with a training vocabulary, and cut the streams into fixed-size shards.",
    after_help = "Settings resolve in order: defaults, --config JSON file, --root, then individual flags. Log verbosity follows RUST_LOG (default: info)."
)]
/// CLI for `article-shards`.
///
/// Common usage:
/// - Full formatting run over `./articles`: `article-shards run`
/// - Run against another dataset root: `article-shards --root /data/wikihow run`
/// - Rebuild only the shards: `article-shards chunk --chunk-size 500`
struct ArticleShardsCli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "JSON pipeline config; missing fields take their defaults"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Dataset root; derives every directory from the default names"
    )]
    root: Option<PathBuf>,
    #[command(flatten)]
    overrides: ConfigOverrides,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ConfigOverrides {
    #[arg(
        long = "expected-articles",
        global = true,
        value_name = "COUNT",
        help = "Number of article files every article directory must hold (default: derived from the articles directory)"
    )]
    expected_articles: Option<usize>,
    #[arg(
        long = "vocab-size",
        global = true,
        value_parser = parse_positive_usize,
        help = "Maximum vocabulary entries written"
    )]
    vocab_size: Option<usize>,
    #[arg(
        long = "chunk-size",
        global = true,
        value_parser = parse_positive_usize,
        help = "Records per shard"
    )]
    chunk_size: Option<usize>,
    #[arg(
        long = "fact-descriptions",
        global = true,
        help = "Article files carry an @fact_descriptions section"
    )]
    fact_descriptions: bool,
    #[arg(
        long = "parallel-splits",
        global = true,
        help = "Chunk the three splits concurrently"
    )]
    parallel_splits: bool,
    #[arg(
        long = "tokenizer",
        global = true,
        value_name = "PROGRAM",
        help = "Tokenizer executable; the mapping file path is passed as its last argument"
    )]
    tokenizer_program: Option<String>,
    #[arg(
        long = "tokenizer-arg",
        global = true,
        value_name = "ARG",
        allow_hyphen_values = true,
        help = "Tokenizer argument placed before the mapping file, repeat as needed (replaces the defaults)"
    )]
    tokenizer_args: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clean a raw title/headline/text CSV table.
    Clean {
        #[arg(long, value_name = "CSV")]
        input: PathBuf,
        #[arg(long, value_name = "CSV")]
        output: PathBuf,
    },
    /// Write one article file per kept row and the title manifest.
    Materialize {
        #[arg(long, value_name = "CSV")]
        cleaned: PathBuf,
    },
    /// Shuffle the title manifest into train/val/test title lists.
    Partition {
        #[arg(long, help = "Shuffle seed")]
        seed: Option<u64>,
        #[arg(long = "test-limit", help = "Maximum test titles")]
        test_limit: Option<usize>,
        #[arg(long = "val-limit", help = "Maximum validation titles")]
        val_limit: Option<usize>,
    },
    /// Run the external tokenizer over the articles directory.
    Tokenize,
    /// Serialize title lists into binary streams (train also writes the vocabulary).
    Serialize {
        #[arg(long, value_enum, help = "Only this split (default: all)")]
        split: Option<SplitArg>,
    },
    /// Cut binary streams into shards.
    Chunk {
        #[arg(long, value_enum, help = "Only this split (default: all)")]
        split: Option<SplitArg>,
    },
    /// Check, tokenize, serialize, and chunk in one pass.
    Run,
}

/// Parse `args_iter` (without the program name) and run the selected stage.
pub fn run_cli<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let Some(cli) = parse_cli::<ArticleShardsCli, _>(
        std::iter::once("article-shards".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let config = resolve_config(&cli)?;
    let layout = &config.layout;

    match cli.command {
        Command::Clean { input, output } => {
            let summary = clean_corpus(&input, &output)?;
            println!(
                "Cleaned {} rows into {} ({} duplicates, {} incomplete).",
                summary.rows_read,
                summary.rows_written,
                summary.duplicates_dropped,
                summary.empty_dropped
            );
        }
        Command::Materialize { cleaned } => {
            let summary =
                materialize_articles(&cleaned, &layout.articles_dir, &layout.manifest_path())?;
            println!(
                "Wrote {} article files to {} ({} rows skipped).",
                summary.articles_written,
                layout.articles_dir.display(),
                summary.rows_skipped
            );
        }
        Command::Partition {
            seed,
            test_limit,
            val_limit,
        } => {
            let mut limits = config.partition;
            limits.seed = seed.unwrap_or(limits.seed);
            limits.test = test_limit.unwrap_or(limits.test);
            limits.validation = val_limit.unwrap_or(limits.validation);
            let partition = partition_manifest(&layout.manifest_path(), &layout.titles_dir, limits)?;
            for split in ALL_SPLITS {
                println!("{split}: {} titles", partition.titles(split).len());
            }
        }
        Command::Tokenize => {
            let count =
                tokenize_articles(&layout.articles_dir, &layout.tokenized_dir, &config.tokenizer)?;
            println!("Tokenized {count} article files.");
        }
        Command::Serialize { split } => {
            let summaries = match split {
                Some(split) => vec![write_split(&job_for(&config, split.into()), layout)?],
                None => write_all_splits(&config)?,
            };
            print_split_summaries(&summaries);
        }
        Command::Chunk { split } => {
            let summaries = match split {
                Some(split) => vec![chunk_split(split.into(), layout, config.chunk_size)?],
                None => chunk_all(&config)?,
            };
            print_chunk_summaries(&summaries);
        }
        Command::Run => {
            let summary = run(&config)?;
            println!(
                "Verified {} articles; tokenized {} files.",
                summary.expected_articles, summary.tokenized
            );
            print_split_summaries(&summary.splits);
            print_chunk_summaries(&summary.chunks);
        }
    }
    Ok(())
}

fn resolve_config(cli: &ArticleShardsCli) -> Result<PipelineConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.layout = DatasetLayout::rooted_at(root);
    }
    let overrides = &cli.overrides;
    if overrides.expected_articles.is_some() {
        config.expected_articles = overrides.expected_articles;
    }
    config.vocab_size = overrides.vocab_size.unwrap_or(config.vocab_size);
    config.chunk_size = overrides.chunk_size.unwrap_or(config.chunk_size);
    if overrides.fact_descriptions {
        config.article_format = ArticleFormat::WithFactDescriptions;
    }
    config.parallel_splits |= overrides.parallel_splits;
    if let Some(program) = &overrides.tokenizer_program {
        config.tokenizer.program = program.clone();
    }
    if !overrides.tokenizer_args.is_empty() {
        config.tokenizer.args = overrides.tokenizer_args.clone();
    }
    Ok(config.validated()?)
}

fn print_split_summaries(summaries: &[SplitSummary]) {
    for summary in summaries {
        print!(
            "{}: {} records, {} bytes -> {}",
            summary.split,
            summary.records,
            summary.bytes,
            summary.stream_path.display()
        );
        match summary.vocab_entries {
            Some(entries) => println!(" (vocab: {entries} entries)"),
            None => println!(),
        }
    }
}

fn print_chunk_summaries(summaries: &[ChunkSummary]) {
    for summary in summaries {
        println!(
            "{}: {} records in {} shards",
            summary.split,
            summary.records,
            summary.shards.len()
        );
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArticleShardsCli {
        parse_cli::<ArticleShardsCli, _>(
            std::iter::once("article-shards").chain(args.iter().copied()),
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn help_returns_none() {
        let parsed =
            parse_cli::<ArticleShardsCli, _>(["article-shards", "--help"]).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn unknown_subcommand_is_an_error() {
        assert!(parse_cli::<ArticleShardsCli, _>(["article-shards", "shuffle"]).is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected_by_parser() {
        assert!(
            parse_cli::<ArticleShardsCli, _>(["article-shards", "chunk", "--chunk-size", "0"])
                .is_err()
        );
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--root",
            "/data",
            "run",
            "--expected-articles",
            "12",
            "--fact-descriptions",
            "--tokenizer",
            "sh",
            "--tokenizer-arg",
            "-c",
            "--tokenizer-arg",
            "cat",
        ]);
        assert!(matches!(cli.command, Command::Run));
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.layout, DatasetLayout::rooted_at("/data"));
        assert_eq!(config.expected_articles, Some(12));
        assert_eq!(config.article_format, ArticleFormat::WithFactDescriptions);
        assert_eq!(config.tokenizer.program, "sh");
        assert_eq!(config.tokenizer.args, vec!["-c", "cat"]);
        assert_eq!(config.chunk_size, 1000);
    }

    #[test]
    fn split_argument_maps_to_label() {
        let cli = parse(&["serialize", "--split", "validation"]);
        match cli.command {
            Command::Serialize { split: Some(split) } => {
                assert_eq!(SplitLabel::from(split), SplitLabel::Validation)
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn val_is_accepted_as_split_name() {
        for args in [["chunk", "--split", "val"], ["serialize", "--split", "val"]] {
            let split = match parse(&args).command {
                Command::Chunk { split } | Command::Serialize { split } => split,
                other => panic!("unexpected command: {other:?}"),
            };
            assert_eq!(split.map(SplitLabel::from), Some(SplitLabel::Validation));
        }
    }
}
