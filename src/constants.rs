use crate::splits::SplitLabel;

/// Constants used by the article parser and record payload layout.
pub mod format {
    /// Marker opening the summary section of an article file.
    pub const SUMMARY_MARKER: &str = "@summary";
    /// Marker opening the fact-descriptions section of an article file.
    pub const FACT_DESCRIPTIONS_MARKER: &str = "@fact_descriptions";
    /// Token inserted before every summary sentence.
    pub const SENTENCE_START: &str = "<s>";
    /// Token appended after every summary sentence.
    pub const SENTENCE_END: &str = "</s>";
    /// Separator placed between fact-description lines.
    pub const FACT_SEPARATOR: &str = " ||| ";
    /// Suffix appended to lines with no terminal punctuation.
    pub const MISSING_PERIOD_SUFFIX: &str = " .";
    /// Accepted line endings; anything else gets [`MISSING_PERIOD_SUFFIX`].
    pub const END_TOKENS: [&str; 10] = [
        ".", "!", "?", "...", "'", "`", "\"", "\u{2019}", "\u{201d}", ")",
    ];

    /// Payload key holding the article body.
    pub const FIELD_ARTICLE: &str = "article";
    /// Payload key holding joined fact descriptions.
    pub const FIELD_FACT_DESCRIPTIONS: &str = "fact_descriptions";
    /// Payload key holding the summary (`abstract` is what pointer-generator readers expect).
    pub const FIELD_ABSTRACT: &str = "abstract";
}

/// Constants used by the length-prefixed record framing and tf.Example wire layout.
pub mod record {
    /// Size of the signed little-endian length header in front of each payload.
    pub const LENGTH_HEADER_BYTES: usize = 8;
    /// Protobuf wire type for varint scalars.
    pub const WIRE_VARINT: u8 = 0;
    /// Protobuf wire type for fixed 64-bit scalars.
    pub const WIRE_FIXED64: u8 = 1;
    /// Protobuf wire type for length-delimited fields.
    pub const WIRE_LEN: u8 = 2;
    /// Protobuf wire type for fixed 32-bit scalars.
    pub const WIRE_FIXED32: u8 = 5;
    /// `Example.features` field number.
    pub const EXAMPLE_FEATURES_FIELD: u32 = 1;
    /// `Features.feature` (map) field number.
    pub const FEATURES_MAP_FIELD: u32 = 1;
    /// Map entry key field number.
    pub const MAP_KEY_FIELD: u32 = 1;
    /// Map entry value field number.
    pub const MAP_VALUE_FIELD: u32 = 2;
    /// `Feature.bytes_list` field number.
    pub const FEATURE_BYTES_LIST_FIELD: u32 = 1;
    /// `Feature.float_list` field number.
    pub const FEATURE_FLOAT_LIST_FIELD: u32 = 2;
    /// `Feature.int64_list` field number.
    pub const FEATURE_INT64_LIST_FIELD: u32 = 3;
    /// `BytesList.value` field number.
    pub const BYTES_LIST_VALUE_FIELD: u32 = 1;
}

/// Constants used by the serializer, vocabulary writer, and chunker.
pub mod limits {
    /// Maximum number of vocabulary entries written.
    pub const VOCAB_SIZE: usize = 200_000;
    /// Records per shard file.
    pub const CHUNK_SIZE: usize = 1000;
    /// Titles between serializer progress log lines.
    pub const PROGRESS_EVERY: usize = 1000;
}

/// Constants used by the upstream corpus stages.
pub mod corpus {
    /// Title column of the raw and cleaned tables.
    pub const COLUMN_TITLE: &str = "title";
    /// Summary column of the raw and cleaned tables.
    pub const COLUMN_HEADLINE: &str = "headline";
    /// Body column of the raw and cleaned tables.
    pub const COLUMN_TEXT: &str = "text";
    /// A summary must be shorter than this fraction of its article to be kept.
    pub const MAX_SUMMARY_RATIO: f64 = 0.75;
    /// Characters trimmed from both ends of every cleaned field.
    pub const TRIM_CHARS: [char; 2] = [' ', ';'];
    /// Default cap on the test partition.
    pub const NUM_TEST_LIMIT: usize = 50_000;
    /// Default cap on the validation partition.
    pub const NUM_VAL_LIMIT: usize = 50_000;
    /// Default partition shuffle seed.
    pub const DEFAULT_PARTITION_SEED: u64 = 42;
}

/// Constants describing the on-disk directory layout.
pub mod layout {
    use super::SplitLabel;

    /// Raw article files directory.
    pub const ARTICLES_DIR: &str = "articles";
    /// Tokenized article files directory.
    pub const TOKENIZED_ARTICLES_DIR: &str = "articles_tokenized";
    /// Output directory for streams and vocabulary.
    pub const FINISHED_FILES_DIR: &str = "finished_files";
    /// Subdirectory of [`FINISHED_FILES_DIR`] holding shards.
    pub const CHUNKS_DIR: &str = "chunked";
    /// Vocabulary filename inside [`FINISHED_FILES_DIR`].
    pub const VOCAB_FILENAME: &str = "vocab";
    /// Title manifest written by the materializer.
    pub const TITLES_FILENAME: &str = "titles.txt";
    /// Extension shared by article files.
    pub const ARTICLE_EXTENSION: &str = "txt";
    /// Extension shared by streams and shards.
    pub const BIN_EXTENSION: &str = "bin";
    /// Temporary tokenizer IO list.
    pub const TOKENIZER_MAPPING_FILENAME: &str = "mapping.txt";
    /// Canonical split processing order.
    pub const ALL_SPLITS: [SplitLabel; 3] =
        [SplitLabel::Train, SplitLabel::Test, SplitLabel::Validation];
}

/// Constants for the external tokenizer invocation.
pub mod tokenizer {
    /// Default tokenizer executable.
    pub const DEFAULT_PROGRAM: &str = "java";
    /// Default tokenizer arguments; the mapping file path is appended last.
    pub const DEFAULT_ARGS: [&str; 3] = [
        "edu.stanford.nlp.process.PTBTokenizer",
        "-ioFileList",
        "-preserveLines",
    ];
}
