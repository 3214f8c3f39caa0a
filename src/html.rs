//! Regex-based HTML scanning helpers.
//!
//! Listing and detail pages are scanned with a few tolerant regexes rather
//! than a DOM parser; these helpers pull attributes and text out of the
//! fragments those regexes match.

use std::sync::LazyLock;

use regex::Regex;

use crate::urls::decode_entities;

/// Compiles a regex at static init; panics on an invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#,
    )
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

/// Attributes of one start tag, names lowercased and values entity-decoded.
#[must_use]
pub fn tag_attributes(tag: &str) -> Vec<(String, String)> {
    // Skip the element name so `<a-b ...>` style names are never read as attributes.
    let body = tag
        .trim_start_matches('<')
        .split_once(char::is_whitespace)
        .map_or("", |(_, rest)| rest);

    ATTRIBUTE_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((name, decode_entities(value.trim())))
        })
        .collect()
}

/// Value of attribute `name` (case-insensitive) in a start tag.
#[must_use]
pub fn attribute(tag: &str, name: &str) -> Option<String> {
    tag_attributes(tag)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Visible text of an HTML fragment: tags removed, entities decoded, whitespace collapsed.
#[must_use]
pub fn text_content(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}
