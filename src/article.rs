//! Tokenized article file parsing.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::constants::format::{
    END_TOKENS, FACT_DESCRIPTIONS_MARKER, FACT_SEPARATOR, FIELD_ABSTRACT, FIELD_ARTICLE,
    FIELD_FACT_DESCRIPTIONS, MISSING_PERIOD_SUFFIX, SENTENCE_END, SENTENCE_START, SUMMARY_MARKER,
};
use crate::errors::PipelineError;
use crate::record::Example;

/// Which section markers an article file may carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleFormat {
    /// Body, `@summary`, summary.
    #[default]
    Plain,
    /// Body, `@fact_descriptions`, facts, `@summary`, summary.
    WithFactDescriptions,
}

/// Parser position inside an article file. Only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Body,
    Facts,
    Summary,
}

/// Text fields recovered from one article file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedArticle {
    /// Body lines joined by single spaces.
    pub article: String,
    /// Fact lines joined by ` ||| ` (only for [`ArticleFormat::WithFactDescriptions`]).
    pub fact_descriptions: Option<String>,
    /// Summary lines, each wrapped in sentence markers, joined by single spaces.
    pub summary: String,
}

impl ParsedArticle {
    /// Record payload with `article`, optional `fact_descriptions`, and `abstract`.
    pub fn to_example(&self) -> Example {
        let mut example = Example::new().with_text(FIELD_ARTICLE, &self.article);
        if let Some(facts) = &self.fact_descriptions {
            example = example.with_text(FIELD_FACT_DESCRIPTIONS, facts);
        }
        example.with_text(FIELD_ABSTRACT, &self.summary)
    }
}

/// Append ` .` unless the line is empty or already ends in terminal punctuation.
pub fn fix_missing_period(line: &str) -> Cow<'_, str> {
    if line.is_empty() || END_TOKENS.iter().any(|token| line.ends_with(token)) {
        Cow::Borrowed(line)
    } else {
        Cow::Owned(format!("{line}{MISSING_PERIOD_SUFFIX}"))
    }
}

/// Parse article lines into body, optional facts, and summary.
pub fn parse_lines<I, S>(lines: I, format: ArticleFormat) -> ParsedArticle
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut section = Section::Body;
    let mut body = Vec::new();
    let mut facts = Vec::new();
    let mut summary = Vec::new();

    for raw in lines {
        let lowered = raw.as_ref().trim().to_lowercase();
        let line = fix_missing_period(&lowered);
        if line.is_empty() {
            continue;
        }
        if line.starts_with(SUMMARY_MARKER) {
            section = Section::Summary;
            continue;
        }
        if format == ArticleFormat::WithFactDescriptions && line.starts_with(FACT_DESCRIPTIONS_MARKER)
        {
            section = section.max(Section::Facts);
            continue;
        }
        match section {
            Section::Body => body.push(line.into_owned()),
            Section::Facts => facts.push(line.into_owned()),
            Section::Summary => summary.push(line.into_owned()),
        }
    }

    let fact_descriptions = match format {
        ArticleFormat::Plain => None,
        ArticleFormat::WithFactDescriptions => Some(facts.join(FACT_SEPARATOR)),
    };
    let summary = summary
        .iter()
        .map(|sentence| format!("{SENTENCE_START} {sentence} {SENTENCE_END}"))
        .collect::<Vec<_>>()
        .join(" ");

    ParsedArticle {
        article: body.join(" "),
        fact_descriptions,
        summary,
    }
}

/// Read and parse one tokenized article file.
pub fn read_article_file(path: &Path, format: ArticleFormat) -> Result<ParsedArticle, PipelineError> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_lines(contents.lines(), format))
}
