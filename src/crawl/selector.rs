//! Listing-page selectors: which links are candidates and where the next page is.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::AssetReference;
use crate::config::{ConfigError, SiteConfig};
use crate::html::{attribute, compile_static_regex, tag_attributes, text_content};
use crate::urls::{absolutize, decode_entities};

/// Every anchor with its attribute block (1) and inner HTML (2).
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<a\b([^>]*)>(.*?)</a\s*>"));

/// Start tags that can carry `rel="next"`.
static LINK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<(?:a|link)\b[^>]*>"));

/// Extracts candidates and the next-page link from a listing page.
///
/// Implementations must be deterministic: the same HTML yields the same
/// candidates in the same order.
pub trait ListingSelector: Send + Sync {
    /// Candidate asset references on the page, in document order.
    fn references(&self, html: &str, page_url: &Url) -> Vec<AssetReference>;

    /// Absolute URL of the next listing page, or `None` when pagination ends.
    /// `candidates_found` is the number of references the page produced.
    fn next_page(&self, html: &str, page_url: &Url, candidates_found: usize) -> Option<Url>;
}

/// How a [`RegexListingSelector`] finds the next page.
#[derive(Debug, Clone)]
pub enum Pagination {
    /// Follow `<a rel="next">` / `<link rel="next">`.
    RelNext,
    /// Follow capture group 1 of this regex.
    NextPattern(Regex),
    /// Increment this query parameter (missing counts as page 1); stop on an empty page.
    QueryParam {
        /// Parameter name, e.g. `page`.
        name: String,
    },
    /// Single page only.
    Disabled,
}

#[derive(Debug, Clone)]
enum ItemMatcher {
    Anchors,
    Pattern(Regex),
}

/// Generic selector driven by regexes.
///
/// By default every anchor except `rel="next"`/`rel="prev"` links is a
/// candidate; `href_filter` narrows that down to the site's detail links.
#[derive(Debug, Clone)]
pub struct RegexListingSelector {
    items: ItemMatcher,
    href_filter: Option<Regex>,
    pagination: Pagination,
}

impl Default for RegexListingSelector {
    fn default() -> Self {
        Self {
            items: ItemMatcher::Anchors,
            href_filter: None,
            pagination: Pagination::RelNext,
        }
    }
}

impl RegexListingSelector {
    /// Anchor-scanning selector with an optional href filter.
    #[must_use]
    pub fn anchors(href_filter: Option<Regex>, pagination: Pagination) -> Self {
        Self {
            items: ItemMatcher::Anchors,
            href_filter,
            pagination,
        }
    }

    /// Selector with a custom item regex. Capture `href` (or group 1) is the
    /// link, capture `title` (or group 2) the title.
    #[must_use]
    pub fn with_item_pattern(
        item: Regex,
        href_filter: Option<Regex>,
        pagination: Pagination,
    ) -> Self {
        Self {
            items: ItemMatcher::Pattern(item),
            href_filter,
            pagination,
        }
    }

    /// Builds a selector from the `[site]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for a regex that does not compile
    /// and [`ConfigError::Invalid`] when both `next_pattern` and `page_param` are set.
    pub fn from_site(site: &SiteConfig) -> Result<Self, ConfigError> {
        let compile = |field: &'static str, pattern: &Option<String>| {
            pattern
                .as_deref()
                .map(|p| Regex::new(p).map_err(|source| ConfigError::InvalidPattern { field, source }))
                .transpose()
        };

        let item = compile("item_pattern", &site.item_pattern)?;
        let href_filter = compile("href_filter", &site.href_filter)?;
        let next = compile("next_pattern", &site.next_pattern)?;

        let pagination = match (next, site.page_param.as_deref().map(str::trim)) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    "page_param",
                    "cannot be combined with next_pattern",
                ));
            }
            (Some(re), None) => Pagination::NextPattern(re),
            (None, Some("")) => {
                return Err(ConfigError::invalid("page_param", "must not be empty"));
            }
            (None, Some(name)) => Pagination::QueryParam {
                name: name.to_string(),
            },
            (None, None) => Pagination::RelNext,
        };

        Ok(match item {
            Some(re) => Self::with_item_pattern(re, href_filter, pagination),
            None => Self::anchors(href_filter, pagination),
        })
    }

    fn passes_filter(&self, href: &str) -> bool {
        self.href_filter.as_ref().is_none_or(|re| re.is_match(href))
    }

    fn anchor_references(&self, html: &str, page_url: &Url) -> Vec<AssetReference> {
        let mut out = Vec::new();
        for caps in ANCHOR_RE.captures_iter(html) {
            let attrs = tag_attributes(&format!("<a {}>", caps.get(1).map_or("", |m| m.as_str())));
            let get = |name: &str| {
                attrs
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.as_str())
            };

            if get("rel").is_some_and(is_pagination_rel) {
                continue;
            }
            let Some(href) = get("href").filter(|h| !h.trim().is_empty()) else {
                continue;
            };
            if !self.passes_filter(href) {
                continue;
            }

            let mut title = text_content(caps.get(2).map_or("", |m| m.as_str()));
            if title.is_empty() {
                title = get("title")
                    .or_else(|| get("aria-label"))
                    .unwrap_or_default()
                    .to_string();
            }
            out.push(AssetReference::new(page_url.clone(), href.trim(), title));
        }
        out
    }

    fn pattern_references(&self, item: &Regex, html: &str, page_url: &Url) -> Vec<AssetReference> {
        item.captures_iter(html)
            .filter_map(|caps| {
                let href = caps.name("href").or_else(|| caps.get(1))?;
                let href = decode_entities(href.as_str().trim());
                if href.is_empty() || !self.passes_filter(&href) {
                    return None;
                }
                let title = caps
                    .name("title")
                    .or_else(|| caps.get(2))
                    .map(|m| text_content(m.as_str()))
                    .unwrap_or_default();
                Some(AssetReference::new(page_url.clone(), href, title))
            })
            .collect()
    }
}

fn is_pagination_rel(rel: &str) -> bool {
    rel.split_whitespace()
        .any(|token| matches!(token.to_ascii_lowercase().as_str(), "next" | "prev" | "previous"))
}

fn rel_next_link(html: &str, page_url: &Url) -> Option<Url> {
    LINK_TAG_RE.find_iter(html).find_map(|tag| {
        let rel = attribute(tag.as_str(), "rel")?;
        let is_next = rel
            .split_whitespace()
            .any(|token| token.eq_ignore_ascii_case("next"));
        if !is_next {
            return None;
        }
        absolutize(&attribute(tag.as_str(), "href")?, page_url)
    })
}

/// `page_url` with query parameter `name` incremented (absent counts as 1).
#[must_use]
pub fn increment_page_param(page_url: &Url, name: &str) -> Url {
    let mut current: Option<u64> = None;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in page_url.query_pairs() {
        if key == name {
            current = value.trim().parse().ok();
        } else {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    let next = current.unwrap_or(1).saturating_add(1);

    let mut url = page_url.clone();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        query.append_pair(name, &next.to_string());
    }
    url
}

impl ListingSelector for RegexListingSelector {
    fn references(&self, html: &str, page_url: &Url) -> Vec<AssetReference> {
        match &self.items {
            ItemMatcher::Anchors => self.anchor_references(html, page_url),
            ItemMatcher::Pattern(item) => self.pattern_references(item, html, page_url),
        }
    }

    fn next_page(&self, html: &str, page_url: &Url, candidates_found: usize) -> Option<Url> {
        match &self.pagination {
            Pagination::RelNext => rel_next_link(html, page_url),
            Pagination::NextPattern(re) => {
                let href = re.captures(html)?.get(1)?.as_str();
                absolutize(&decode_entities(href), page_url)
            }
            Pagination::QueryParam { name } => {
                (candidates_found > 0).then(|| increment_page_param(page_url, name))
            }
            Pagination::Disabled => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://sounds.example.com/search?q=dog").unwrap()
    }

    const LISTING: &str = r#"
        <nav><a href="/">Home</a></nav>
        <ul>
          <li><a class="item" href="/sound/1/"><span>Dog</span> bark</a></li>
          <li><a class="item" href="/sound/2/" title="Howl"><img src="t.jpg"></a></li>
          <li><a class="item" href="https://cdn.example.com/a.mp3">Direct &amp; loud</a></li>
        </ul>
        <a rel="next" href="/search?q=dog&amp;page=2">Next</a>
    "#;

    // ==================== Anchor Selection Tests ====================

    #[test]
    fn test_anchor_selector_collects_all_links_but_pagination() {
        let refs = RegexListingSelector::default().references(LISTING, &page());
        let hrefs: Vec<_> = refs.iter().map(|r| r.raw_href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["/", "/sound/1/", "/sound/2/", "https://cdn.example.com/a.mp3"]
        );
    }

    #[test]
    fn test_anchor_selector_titles_from_text_or_attribute() {
        let refs = RegexListingSelector::default().references(LISTING, &page());
        assert_eq!(refs[1].title_hint, "Dog bark");
        assert_eq!(refs[2].title_hint, "Howl");
        assert_eq!(refs[3].title_hint, "Direct & loud");
        assert_eq!(refs[1].source_page, page());
    }

    #[test]
    fn test_href_filter_narrows_candidates() {
        let selector = RegexListingSelector::anchors(
            Some(Regex::new(r"^/sound/\d+").unwrap()),
            Pagination::RelNext,
        );
        let refs = selector.references(LISTING, &page());
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_item_pattern_uses_named_groups() {
        let selector = RegexListingSelector::with_item_pattern(
            Regex::new(r#"data-sound="(?P<href>[^"]+)"\s+data-name="(?P<title>[^"]+)""#).unwrap(),
            None,
            Pagination::Disabled,
        );
        let html = r#"<div data-sound="/s/9" data-name="Rain"></div>"#;
        let refs = selector.references(html, &page());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].raw_href, "/s/9");
        assert_eq!(refs[0].title_hint, "Rain");
    }

    // ==================== Pagination Tests ====================

    #[test]
    fn test_rel_next_resolves_relative_link() {
        let next = RegexListingSelector::default().next_page(LISTING, &page(), 3);
        assert_eq!(
            next.unwrap().as_str(),
            "https://sounds.example.com/search?q=dog&page=2"
        );
    }

    #[test]
    fn test_rel_next_accepts_link_element() {
        let html = r#"<head><link href="/p/3" rel="prefetch next"></head>"#;
        let next = RegexListingSelector::default().next_page(html, &page(), 0);
        assert_eq!(next.unwrap().path(), "/p/3");
    }

    #[test]
    fn test_no_next_link_ends_pagination() {
        let html = r#"<a href="/sound/1/">x</a>"#;
        assert!(RegexListingSelector::default().next_page(html, &page(), 1).is_none());
    }

    #[test]
    fn test_next_pattern() {
        let selector = RegexListingSelector::anchors(
            None,
            Pagination::NextPattern(Regex::new(r#"class="more" href="([^"]+)""#).unwrap()),
        );
        let html = r#"<a class="more" href="?q=dog&amp;page=5">more</a>"#;
        let next = selector.next_page(html, &page(), 1).unwrap();
        assert_eq!(next.as_str(), "https://sounds.example.com/search?q=dog&page=5");
    }

    #[test]
    fn test_query_param_pagination_stops_on_empty_page() {
        let selector = RegexListingSelector::anchors(
            None,
            Pagination::QueryParam {
                name: "page".to_string(),
            },
        );
        assert!(selector.next_page("", &page(), 0).is_none());
        let next = selector.next_page("", &page(), 4).unwrap();
        assert_eq!(next.as_str(), "https://sounds.example.com/search?q=dog&page=2");
    }

    #[test]
    fn test_increment_page_param_replaces_existing_value() {
        let url = Url::parse("https://example.com/l?page=7&q=cat").unwrap();
        let next = increment_page_param(&url, "page");
        assert_eq!(next.as_str(), "https://example.com/l?q=cat&page=8");
    }

    // ==================== Config Tests ====================

    #[test]
    fn test_from_site_rejects_bad_regex() {
        let site = SiteConfig {
            href_filter: Some("(".to_string()),
            ..SiteConfig::default()
        };
        assert!(matches!(
            RegexListingSelector::from_site(&site),
            Err(ConfigError::InvalidPattern {
                field: "href_filter",
                ..
            })
        ));
    }

    #[test]
    fn test_from_site_rejects_conflicting_pagination() {
        let site = SiteConfig {
            next_pattern: Some("x(.)".to_string()),
            page_param: Some("page".to_string()),
            ..SiteConfig::default()
        };
        assert!(RegexListingSelector::from_site(&site).is_err());
    }

    #[test]
    fn test_from_site_query_param_mode() {
        let site = SiteConfig {
            page_param: Some("p".to_string()),
            ..SiteConfig::default()
        };
        let selector = RegexListingSelector::from_site(&site).unwrap();
        let next = selector.next_page("", &page(), 1).unwrap();
        assert!(next.as_str().ends_with("p=2"));
    }
}
