//! Destination naming for acquired assets.
//!
//! Files are named `{index:04}_{title}{ext}` so a directory listing sorts in
//! acquisition order and every name is safe on common file systems.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use url::Url;

use super::constants::TEMP_SUFFIX;
use crate::urls::extension_of;

/// Maximum characters kept from the title.
const MAX_TITLE_CHARS: usize = 80;

/// Title used when nothing printable survives sanitization.
const FALLBACK_TITLE: &str = "asset";

/// Extension used when the URL carries none.
const FALLBACK_EXTENSION: &str = ".bin";

/// Reduces a title to `[A-Za-z0-9_-]`, collapsing separator runs into one `_`.
///
/// ```
/// use harvester_core::download::sanitize_title;
///
/// assert_eq!(sanitize_title("Dog bark / loud!!"), "Dog_bark_loud");
/// assert_eq!(sanitize_title("   "), "asset");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_sep = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let trimmed: String = out
        .trim_matches('_')
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let trimmed = trimmed.trim_end_matches('_');

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '-') {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds the destination file name for the `index`-th asset.
///
/// ```
/// use url::Url;
/// use harvester_core::download::asset_filename;
///
/// let url = Url::parse("https://cdn.example.com/p/12345.mp3").unwrap();
/// assert_eq!(asset_filename(7, "Dog Bark", &url), "0007_Dog_Bark.mp3");
/// ```
#[must_use]
pub fn asset_filename(index: usize, title: &str, url: &Url) -> String {
    let extension = extension_of(url).map_or_else(|| FALLBACK_EXTENSION.to_string(), |e| format!(".{e}"));
    format!("{index:04}_{}{extension}", sanitize_title(title))
}

/// Path of the in-flight temp file for `destination` (`<name>.part`).
#[must_use]
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name: OsString = destination
        .file_name()
        .map_or_else(|| OsString::from("download"), OsString::from);
    name.push(TEMP_SUFFIX);
    destination.with_file_name(name)
}

/// Human-readable title derived from the last URL path segment.
#[must_use]
pub fn title_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let decoded = urlencoding::decode(last).ok()?;
    let stem = decoded
        .rsplit_once('.')
        .map_or(decoded.as_ref(), |(stem, _)| stem);
    let title = stem.replace(['-', '_', '+'], " ").trim().to_string();
    (!title.is_empty()).then_some(title)
}
