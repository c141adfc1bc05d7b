//! Link extraction from markdown content.
//!
//! # Responsibility
//! - Map document content to the set of document names it references.
//! - Rewrite references to one name without disturbing anchors or aliases.
//!
//! # Invariants
//! - Extraction is pure and deterministic; malformed input yields an empty
//!   set, never an error.
//! - Links inside fenced code blocks or inline code are not links.
//! - Name matching is exact and case-sensitive after trimming.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;

static WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").expect("valid wikilink regex"));
static FENCED_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[^\n]*\n.*?```|~~~[^\n]*\n.*?~~~").expect("valid fenced code regex")
});
static INLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`\n]*`").expect("valid inline code regex"));

/// Pluggable link grammar used by the backlink index and relinking.
pub trait LinkExtractor: Send + Sync {
    /// Returns the distinct names referenced by `content`.
    fn extract(&self, content: &str) -> BTreeSet<String>;

    /// Rewrites references to `old_name` into `new_name`.
    ///
    /// Returns `None` when nothing changed.
    fn rewrite(&self, content: &str, old_name: &str, new_name: &str) -> Option<String>;
}

/// Wikilink grammar: `[[Name]]`, `[[Name#anchor]]`, `[[Name|alias]]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WikiLinkExtractor;

/// One link occurrence with the byte span of its trimmed target name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOccurrence {
    pub name: String,
    pub name_span: Range<usize>,
}

impl LinkExtractor for WikiLinkExtractor {
    fn extract(&self, content: &str) -> BTreeSet<String> {
        link_occurrences(content)
            .into_iter()
            .map(|occurrence| occurrence.name)
            .collect()
    }

    fn rewrite(&self, content: &str, old_name: &str, new_name: &str) -> Option<String> {
        rewrite_links(content, old_name, new_name)
    }
}

/// Extracts the distinct wikilink targets in `content`.
pub fn extract_links(content: &str) -> BTreeSet<String> {
    WikiLinkExtractor.extract(content)
}

/// Lists wikilink occurrences outside code, in source order.
pub fn link_occurrences(content: &str) -> Vec<LinkOccurrence> {
    let excluded = code_ranges(content);
    let mut occurrences = Vec::new();

    for caps in WIKILINK_RE.captures_iter(content) {
        let (Some(full), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if excluded
            .iter()
            .any(|range| range.contains(&full.start()))
        {
            continue;
        }

        let body = inner.as_str();
        let target_len = body.find(['#', '|']).unwrap_or(body.len());
        let target = &body[..target_len];
        let name = target.trim();
        if name.is_empty() {
            continue;
        }

        let leading = target.len() - target.trim_start().len();
        let start = inner.start() + leading;
        occurrences.push(LinkOccurrence {
            name: name.to_string(),
            name_span: start..start + name.len(),
        });
    }

    occurrences
}

/// Replaces every link target equal to `old_name` with `new_name`.
///
/// Anchors, aliases and surrounding whitespace inside the brackets are kept.
pub fn rewrite_links(content: &str, old_name: &str, new_name: &str) -> Option<String> {
    if old_name == new_name {
        return None;
    }
    let spans: Vec<Range<usize>> = link_occurrences(content)
        .into_iter()
        .filter(|occurrence| occurrence.name == old_name)
        .map(|occurrence| occurrence.name_span)
        .collect();
    if spans.is_empty() {
        return None;
    }

    let mut rewritten = content.to_string();
    for span in spans.into_iter().rev() {
        rewritten.replace_range(span, new_name);
    }
    Some(rewritten)
}

fn code_ranges(content: &str) -> Vec<Range<usize>> {
    FENCED_CODE_RE
        .find_iter(content)
        .chain(INLINE_CODE_RE.find_iter(content))
        .map(|found| found.range())
        .collect()
}
