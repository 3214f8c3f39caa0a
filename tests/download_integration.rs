//! Integration tests for the asset downloader.
//!
//! These tests drive `AssetDownloader` against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use harvester_core::download::{
    AssetDownloader, Backoff, FailureReason, HttpClient, RateLimiter, RetryPolicy,
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FLOOR: u64 = 1024;

fn downloader(max_attempts: u32) -> AssetDownloader {
    let client = HttpClient::new(Duration::from_secs(5), Duration::from_secs(5), "harvester-test")
        .expect("client builds");
    let policy = RetryPolicy::new(
        max_attempts,
        Backoff::Fixed(Duration::from_millis(10)),
        Duration::ZERO,
    );
    AssetDownloader::new(client, policy, FLOOR, Arc::new(RateLimiter::disabled()))
}

fn asset_url(server: &MockServer, path: &str) -> Url {
    Url::parse(&format!("{}{path}", server.uri())).expect("valid mock url")
}

#[tokio::test]
async fn test_undersized_payload_is_retried_until_valid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bark.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 512]))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bark.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 50 * 1024]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let destination = dir.path().join("0001_bark.mp3");

    let result = downloader(3)
        .download(&asset_url(&server, "/bark.mp3"), &destination)
        .await;

    assert!(result.success, "download should succeed: {result:?}");
    assert_eq!(result.attempts, 2);
    assert_eq!(result.byte_size, 50 * 1024);
    assert_eq!(std::fs::metadata(&destination).expect("file").len(), 50 * 1024);
    assert!(!dir.path().join("0001_bark.mp3.part").exists());
}

#[tokio::test]
async fn test_rerun_reuses_file_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bark.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![3u8; 4096]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let destination = dir.path().join("0001_bark.mp3");
    let url = asset_url(&server, "/bark.mp3");
    let downloader = downloader(3);

    let first = downloader.download(&url, &destination).await;
    let second = downloader.download(&url, &destination).await;

    assert!(first.success);
    assert_eq!(first.attempts, 1);
    assert!(second.success);
    assert!(second.reused());
    assert_eq!(second.attempts, 0);
    assert_eq!(second.byte_size, 4096);
}

#[tokio::test]
async fn test_always_small_payload_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tiny.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 100]))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let destination = dir.path().join("0001_tiny.wav");

    let result = downloader(3)
        .download(&asset_url(&server, "/tiny.wav"), &destination)
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_reason, Some(FailureReason::ExhaustedRetries));
    assert_eq!(result.attempts, 3);
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_html_response_is_invalid_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html>".repeat(500), "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let result = downloader(1)
        .download(&asset_url(&server, "/login.mp3"), &dir.path().join("a.mp3"))
        .await;

    assert_eq!(result.failure_reason, Some(FailureReason::InvalidContent));
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy.ogg"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy.ogg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 2048]))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let result = downloader(3)
        .download(&asset_url(&server, "/busy.ogg"), &dir.path().join("busy.ogg"))
        .await;

    assert!(result.success, "{result:?}");
    assert_eq!(result.attempts, 2);
}
