//! Integration tests for `pushl-fetch`: conditional GET, redirect
//! following, and concurrent-fetch dedup against a mock origin.

use std::sync::Arc;
use std::time::Duration;

use pushl_cache::CacheStore;
use pushl_fetch::CachingFetcher;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetcher(dir: &std::path::Path) -> Arc<CachingFetcher> {
    let cache = Arc::new(CacheStore::open(dir).await.unwrap());
    Arc::new(
        CachingFetcher::new(
            cache,
            "pushl-test/1.0".to_string(),
            4,
            100,
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn plain_get_then_conditional_get_on_second_fetch() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(dir.path()).await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<feed></feed>")
                .insert_header("ETag", "\"v1\"")
                .insert_header("Content-Type", "application/atom+xml"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/feed.xml", server.uri());
    let first = fetcher.fetch(&url).await.unwrap();
    assert!(!first.served_from_cache);
    assert_eq!(first.status, 200);

    let second = fetcher.fetch(&url).await.unwrap();
    assert!(second.served_from_cache);
    assert_eq!(second.body, first.body);
}

#[tokio::test]
async fn follows_redirect_chain() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(dir.path()).await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let url = format!("{}/old", server.uri());
    let result = fetcher.fetch(&url).await.unwrap();
    assert!(result.final_url.ends_with("/new"));
    assert_eq!(result.body, b"hello");
}

#[tokio::test]
async fn concurrent_fetches_of_same_url_hit_origin_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(dir.path()).await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_string("body").set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/post", server.uri());
    let (a, b) = tokio::join!(fetcher.fetch(&url), fetcher.fetch(&url));
    assert_eq!(a.unwrap().body, b.unwrap().body);
}

#[tokio::test]
async fn client_error_does_not_overwrite_prior_body() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher(dir.path()).await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("good body"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/flaky", server.uri());
    let first = fetcher.fetch(&url).await.unwrap();
    assert_eq!(first.body, b"good body");

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let second = fetcher.fetch(&url).await;
    assert!(second.is_err());

    let cache = CacheStore::open(dir.path()).await.unwrap();
    let normalized = pushl_fetch::normalize(&url).unwrap();
    let record = cache.get(&normalized).await.unwrap();
    assert_eq!(record.body.as_deref(), Some(&b"good body"[..]));
}
