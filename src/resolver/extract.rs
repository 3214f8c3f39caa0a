//! Asset extraction strategies for intermediate (detail) pages.
//!
//! Each [`AssetExtractor`] looks for a direct media URL in one place. The
//! resolver runs them in order and the first match wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::html::{compile_static_regex, tag_attributes};
use crate::urls::{AssetExtensions, absolutize};

static META_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<meta\b[^>]*>"));

static START_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<([a-z][a-z0-9-]*)\b[^>]*>"));

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<script\b([^>]*)>(.*?)</script\s*>"));

/// Quoted string literals inside script bodies (JS or JSON).
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#""((?:[^"\\\s]|\\.)+)"|'((?:[^'\\\s]|\\.)+)'"#));

/// Default meta properties checked by [`MetaTagExtractor`].
pub const DEFAULT_META_PROPERTIES: &[&str] = &[
    "og:audio",
    "og:audio:url",
    "og:audio:secure_url",
    "og:video",
    "og:video:url",
    "og:video:secure_url",
    "twitter:player:stream",
    "og:image",
    "og:image:url",
    "og:image:secure_url",
];

/// Default attributes checked by [`AttributeExtractor`].
pub const DEFAULT_ASSET_ATTRIBUTES: &[&str] = &["data-src", "data-mp3", "data-url", "src", "href"];

/// JSON-LD keys that may hold the media URL.
const JSON_LD_KEYS: &[&str] = &["contentUrl", "embedUrl", "url"];

/// One way of finding a direct asset URL in a page.
pub trait AssetExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// First direct asset URL found in `html`, resolved against `page_url`.
    fn extract(&self, html: &str, page_url: &Url, extensions: &AssetExtensions) -> Option<Url>;
}

/// The built-in strategies in their default order.
#[must_use]
pub fn default_extractors() -> Vec<Box<dyn AssetExtractor>> {
    vec![
        Box::new(MetaTagExtractor::default()),
        Box::new(AttributeExtractor::default()),
        Box::new(ScriptExtractor),
        Box::new(PlayerTagExtractor),
    ]
}

fn media_url(candidate: &str, page_url: &Url, extensions: &AssetExtensions) -> Option<Url> {
    absolutize(candidate, page_url).filter(|url| extensions.matches_url(url))
}

/// `<meta property="og:audio" content="...">` and friends.
#[derive(Debug, Clone)]
pub struct MetaTagExtractor {
    properties: Vec<String>,
}

impl Default for MetaTagExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_META_PROPERTIES.iter().copied())
    }
}

impl MetaTagExtractor {
    /// Checks the given `property`/`name` values, in priority order.
    pub fn new<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }
}

impl AssetExtractor for MetaTagExtractor {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn extract(&self, html: &str, page_url: &Url, extensions: &AssetExtensions) -> Option<Url> {
        let metas: Vec<Vec<(String, String)>> = META_TAG_RE
            .find_iter(html)
            .map(|m| tag_attributes(m.as_str()))
            .collect();

        self.properties.iter().find_map(|wanted| {
            metas.iter().find_map(|attrs| {
                let key = attrs
                    .iter()
                    .find(|(k, _)| k == "property" || k == "name")
                    .map(|(_, v)| v)?;
                if !key.eq_ignore_ascii_case(wanted) {
                    return None;
                }
                let content = attrs.iter().find(|(k, _)| k == "content").map(|(_, v)| v)?;
                media_url(content, page_url, extensions)
            })
        })
    }
}

/// Attribute lookup across all start tags (`data-src`, `data-mp3`, ...).
#[derive(Debug, Clone)]
pub struct AttributeExtractor {
    attributes: Vec<String>,
}

impl Default for AttributeExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_ATTRIBUTES.iter().copied())
    }
}

impl AttributeExtractor {
    /// Checks the given attribute names, in priority order.
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            attributes: attributes
                .into_iter()
                .map(|a| a.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl AssetExtractor for AttributeExtractor {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn extract(&self, html: &str, page_url: &Url, extensions: &AssetExtensions) -> Option<Url> {
        let tags: Vec<Vec<(String, String)>> = START_TAG_RE
            .find_iter(html)
            .map(|m| tag_attributes(m.as_str()))
            .collect();

        self.attributes.iter().find_map(|wanted| {
            tags.iter().find_map(|attrs| {
                attrs
                    .iter()
                    .filter(|(name, _)| name == wanted)
                    .find_map(|(_, value)| media_url(value, page_url, extensions))
            })
        })
    }
}

/// Media URLs embedded in `<script>` blocks: JSON-LD first, then quoted strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptExtractor;

impl ScriptExtractor {
    fn from_json_ld(value: &Value, page_url: &Url, extensions: &AssetExtensions) -> Option<Url> {
        match value {
            Value::Object(map) => JSON_LD_KEYS
                .iter()
                .find_map(|key| match map.get(*key) {
                    Some(Value::String(s)) => media_url(s, page_url, extensions),
                    _ => None,
                })
                .or_else(|| {
                    map.values()
                        .find_map(|nested| Self::from_json_ld(nested, page_url, extensions))
                }),
            Value::Array(items) => items
                .iter()
                .find_map(|item| Self::from_json_ld(item, page_url, extensions)),
            _ => None,
        }
    }
}

impl AssetExtractor for ScriptExtractor {
    fn name(&self) -> &'static str {
        "script"
    }

    fn extract(&self, html: &str, page_url: &Url, extensions: &AssetExtensions) -> Option<Url> {
        let scripts: Vec<(String, String)> = SCRIPT_RE
            .captures_iter(html)
            .map(|caps| {
                (
                    caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase(),
                    caps.get(2).map_or("", |m| m.as_str()).to_string(),
                )
            })
            .collect();

        let json_ld = scripts
            .iter()
            .filter(|(attrs, _)| attrs.contains("ld+json"))
            .filter_map(|(_, body)| serde_json::from_str::<Value>(body.trim()).ok())
            .find_map(|value| Self::from_json_ld(&value, page_url, extensions));
        if json_ld.is_some() {
            return json_ld;
        }

        scripts.iter().find_map(|(_, body)| {
            QUOTED_RE.captures_iter(body).find_map(|caps| {
                let literal = caps.get(1).or_else(|| caps.get(2))?.as_str();
                let unescaped = literal.replace("\\/", "/");
                media_url(&unescaped, page_url, extensions)
            })
        })
    }
}

/// `src` of player and image elements. `<audio>`, `<video>` and `<source>`
/// are trusted without an extension; `<img>` and `<embed>` need one.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerTagExtractor;

impl AssetExtractor for PlayerTagExtractor {
    fn name(&self) -> &'static str {
        "player"
    }

    fn extract(&self, html: &str, page_url: &Url, extensions: &AssetExtensions) -> Option<Url> {
        START_TAG_RE.captures_iter(html).find_map(|caps| {
            let element = caps.get(1)?.as_str().to_ascii_lowercase();
            let trusted = matches!(element.as_str(), "audio" | "video" | "source");
            if !trusted && !matches!(element.as_str(), "img" | "embed") {
                return None;
            }
            let attrs = tag_attributes(caps.get(0)?.as_str());
            let src = attrs.iter().find(|(k, _)| k == "src").map(|(_, v)| v)?;
            let url = absolutize(src, page_url)?;
            (trusted || extensions.matches_url(&url)).then_some(url)
        })
    }
}
