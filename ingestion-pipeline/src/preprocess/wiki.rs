use std::{path::Path, sync::OnceLock};

use anyhow::{anyhow, Result};
use common::utils::jsonl::{iter_jsonl, try_save_jsonl};
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::source::SourceDocument;

/// Paragraphs with fewer word tokens are dropped as navigation debris.
pub const MIN_PARAGRAPH_WORDS: usize = 5;

/// One line of Wikipedia-extractor output. Extra fields (`id`, `revid`) are ignored.
#[derive(Debug, Deserialize)]
struct WikiArticle {
    url: String,
    title: String,
    #[serde(default)]
    text: String,
}

struct Patterns {
    paragraph_split: Regex,
    empty_parentheses: Regex,
    word: Regex,
    entity: Regex,
}

fn patterns() -> Result<&'static Patterns> {
    static PATTERNS: OnceLock<Result<Patterns, String>> = OnceLock::new();

    match PATTERNS.get_or_init(|| {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| format!("invalid pattern {pattern}: {e}"))
        };
        Ok(Patterns {
            paragraph_split: build(r"\n+")?,
            empty_parentheses: build(r"\([,;\s]*\)")?,
            word: build(r"\w+")?,
            entity: build(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*)(;?)")?,
        })
    }) {
        Ok(patterns) => Ok(patterns),
        Err(err) => Err(anyhow!(err.clone())),
    }
}

/// True for the HTML4 Latin-1 and markup entities browsers accept without a trailing `;`.
fn is_legacy_entity(decoded: &str) -> bool {
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => matches!(c, '&' | '<' | '>' | '"' | '\u{a0}'..='\u{ff}'),
        _ => false,
    }
}

fn decode_entity(body: &str, terminated: bool) -> Option<String> {
    let candidate = format!("&{body};");
    let decoded = html_escape::decode_html_entities(&candidate);
    if decoded.as_ref() == candidate.as_str() {
        return None;
    }
    if !terminated && !body.starts_with('#') && !is_legacy_entity(&decoded) {
        return None;
    }
    Some(decoded.into_owned())
}

/// Decodes HTML entities, applies NFKC, drops parentheses left empty by markup removal and trims.
///
/// Unknown named entities are kept verbatim.
pub fn normalize_text(text: &str) -> Result<String> {
    let patterns = patterns()?;

    let unescaped = patterns.entity.replace_all(text, |caps: &Captures| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let terminated = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        caps.get(1)
            .and_then(|body| decode_entity(body.as_str(), terminated))
            .unwrap_or_else(|| whole.to_string())
    });
    let normalized: String = unescaped.nfkc().collect();
    let cleaned = patterns.empty_parentheses.replace_all(&normalized, "");

    Ok(cleaned.trim().to_string())
}

/// Splits on runs of newlines and keeps paragraphs with at least `MIN_PARAGRAPH_WORDS` words.
pub fn split_paragraphs(text: &str) -> Result<Vec<String>> {
    let patterns = patterns()?;

    Ok(patterns
        .paragraph_split
        .split(text)
        .filter(|paragraph| patterns.word.find_iter(paragraph).count() >= MIN_PARAGRAPH_WORDS)
        .map(str::to_string)
        .collect())
}

fn prepare_article(article: WikiArticle) -> Result<Option<SourceDocument>> {
    if article.text.is_empty() || article.title.contains(':') {
        return Ok(None);
    }

    let text = normalize_text(&article.text)?;
    Ok(Some(SourceDocument {
        url: article.url,
        title: article.title,
        paragraphs: split_paragraphs(&text)?,
    }))
}

/// Turns Wikipedia-extractor JSONL into knowledge-base JSONL. Returns the number of documents kept.
///
/// Articles with no text, and namespaced pages (a `:` in the title), are skipped. Articles are
/// written as they are read; on a malformed input line the documents before it are kept.
pub fn filter_wiki_data(input: &Path, output: &Path) -> Result<usize> {
    let documents = iter_jsonl::<WikiArticle>(input)?
        .filter_map(|article| article.and_then(prepare_article).transpose());

    let written = try_save_jsonl(documents, output)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        documents = written,
        "Filtered wiki dump"
    );

    Ok(written)
}
