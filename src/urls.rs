//! URL helpers shared by the crawler, resolver and downloader.

use std::path::Path;

use url::Url;

/// Extensions recognised as direct media links when none are configured.
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "ogg", "flac", "m4a", "aac", "jpg", "jpeg", "png", "gif", "webp", "bmp",
];

/// Normalised set of media file extensions (lowercase, no leading dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetExtensions(Vec<String>);

impl Default for AssetExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_EXTENSIONS.iter().copied())
    }
}

impl AssetExtensions {
    /// Builds a set from user input such as `".MP3"` or `"wav"`. Blank entries are dropped.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
            if !ext.is_empty() && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self(normalized)
    }

    /// Returns true when no extension is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the configured extensions.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns true if `ext` (any case, with or without dot) is in the set.
    #[must_use]
    pub fn contains(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.0.iter().any(|known| *known == ext)
    }

    /// Returns true when the URL path ends in a configured extension.
    #[must_use]
    pub fn matches_url(&self, url: &Url) -> bool {
        extension_of(url).is_some_and(|ext| self.contains(&ext))
    }

    /// Returns true when the file name ends in a configured extension.
    #[must_use]
    pub fn matches_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.contains(ext))
    }
}

/// Lowercased extension of the last path segment, if it looks like one.
///
/// ```
/// use url::Url;
/// use harvester_core::urls::extension_of;
///
/// let url = Url::parse("https://cdn.example.com/s/Dog-Bark.MP3?sig=1").unwrap();
/// assert_eq!(extension_of(&url).as_deref(), Some("mp3"));
/// ```
#[must_use]
pub fn extension_of(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 8 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Resolves `href` against `base`, returning only http(s) URLs.
///
/// Protocol-relative links (`//host/path`) take the scheme of `base`.
/// Fragments, `javascript:`, `mailto:` and `data:` links yield `None`.
#[must_use]
pub fn absolutize(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "data:", "tel:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let resolved = if href.starts_with("//") {
        Url::parse(&format!("{}:{href}", base.scheme())).ok()?
    } else {
        base.join(href).ok()?
    };

    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Canonical form used to detect duplicate links: fragment removed and a
/// trailing slash dropped (except for the root path).
#[must_use]
pub fn dedup_key(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }
    normalized.to_string()
}

/// Decodes the handful of HTML entities that show up in attribute values and titles.
#[must_use]
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&#x2F;", "/")
        .replace("&#47;", "/")
        .replace("&amp;", "&")
}
