//! Integration tests for asset resolution against a mock site.

use std::sync::Arc;
use std::time::Duration;

use harvester_core::config::CrawlerConfig;
use harvester_core::crawl::AssetReference;
use harvester_core::download::RateLimiter;
use harvester_core::fetch::HttpPageFetcher;
use harvester_core::resolver::{ResolutionMiss, UrlResolver};
use harvester_core::urls::AssetExtensions;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver() -> UrlResolver {
    let config = CrawlerConfig {
        politeness_delay: Duration::ZERO,
        ..CrawlerConfig::default()
    };
    let fetcher = HttpPageFetcher::new(&config, Arc::new(RateLimiter::disabled())).expect("fetcher builds");
    UrlResolver::new(Arc::new(fetcher), AssetExtensions::default())
}

fn listing_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/search?q=dog", server.uri())).expect("url")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_direct_link_resolves_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let reference = AssetReference::new(listing_url(&server), "/media/dog-bark.mp3", "");
    let resolved = resolver().resolve(&reference).await.expect("resolves");

    assert_eq!(resolved.direct_url.path(), "/media/dog-bark.mp3");
    assert_eq!(resolved.suggested_name, "dog bark");
}

#[tokio::test]
async fn test_detail_page_meta_tag_is_followed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sounds/42"))
        .respond_with(html(
            r#"<html><head>
                <meta property="og:audio" content="/files/42/bark.mp3">
            </head><body><a href="/sounds/43">next sound</a></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sounds/43"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let reference = AssetReference::new(listing_url(&server), "/sounds/42", "Big Dog Bark");
    let resolved = resolver().resolve(&reference).await.expect("resolves");

    assert_eq!(resolved.direct_url.path(), "/files/42/bark.mp3");
    assert_eq!(resolved.suggested_name, "Big Dog Bark");
}

#[tokio::test]
async fn test_detail_page_player_source_tag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sounds/7"))
        .respond_with(html(
            r#"<audio controls><source src="https://cdn.example.org/7.ogg" type="audio/ogg"></audio>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let reference = AssetReference::new(listing_url(&server), "/sounds/7", "");
    let resolved = resolver().resolve(&reference).await.expect("resolves");

    assert_eq!(resolved.direct_url.as_str(), "https://cdn.example.org/7.ogg");
}

#[tokio::test]
async fn test_detail_page_without_media_is_no_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sounds/9"))
        .respond_with(html("<html><body><p>Removed by uploader.</p></body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let reference = AssetReference::new(listing_url(&server), "/sounds/9", "");
    let miss = resolver().resolve(&reference).await.expect_err("no media");

    assert!(matches!(miss, ResolutionMiss::NoMatch { .. }), "{miss:?}");
}

#[tokio::test]
async fn test_detail_page_error_is_fetch_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sounds/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let reference = AssetReference::new(listing_url(&server), "/sounds/gone", "");
    let miss = resolver().resolve(&reference).await.expect_err("fetch fails");

    assert!(matches!(miss, ResolutionMiss::FetchFailed { .. }), "{miss:?}");
}
