//! Endpoint discovery and outbound notification dispatch (spec §4.6).
//!
//! The three sinks are thin `#[async_trait]` traits over the shared
//! `CachingFetcher` so dispatch is unit-testable against a fake sink,
//! mirroring the teacher's `PageScraper` trait / `ChromeScraper` /
//! `FirecrawlScraper` / `FallbackScraper` triad.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use tracing::{info, warn};

use pushl_fetch::{find_rel, CachingFetcher, FetchResult};

use crate::error::CoreError;
use crate::html;

const PING_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[async_trait]
pub trait WebmentionSink: Send + Sync {
    async fn notify(&self, endpoint: &str, source: &str, target: &str) -> Result<u16, CoreError>;
}

#[async_trait]
pub trait WebSubHub: Send + Sync {
    async fn publish(&self, hub: &str, feed_self: &str) -> Result<u16, CoreError>;
}

#[async_trait]
pub trait WaybackArchiver: Send + Sync {
    async fn save(&self, target: &str) -> Result<u16, CoreError>;
}

/// The production implementation of all three sinks, delegating to the
/// shared fetcher so pings ride the same per-host/global concurrency
/// caps as ordinary fetches (spec §4.6: "All three share... per-host
/// concurrency from C2/C3").
pub struct FetcherPingClient {
    fetcher: Arc<CachingFetcher>,
}

impl FetcherPingClient {
    pub fn new(fetcher: Arc<CachingFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl WebmentionSink for FetcherPingClient {
    async fn notify(&self, endpoint: &str, source: &str, target: &str) -> Result<u16, CoreError> {
        let status = self
            .fetcher
            .post_form(endpoint, &[("source", source), ("target", target)])
            .await?;
        Ok(status)
    }
}

#[async_trait]
impl WebSubHub for FetcherPingClient {
    async fn publish(&self, hub: &str, feed_self: &str) -> Result<u16, CoreError> {
        let status = self
            .fetcher
            .post_form(hub, &[("hub.mode", "publish"), ("hub.url", feed_self)])
            .await?;
        Ok(status)
    }
}

#[async_trait]
impl WaybackArchiver for FetcherPingClient {
    async fn save(&self, target: &str) -> Result<u16, CoreError> {
        let save_url = format!("https://web.archive.org/save/{target}");
        let status = self.fetcher.get_uncached(&save_url).await?;
        Ok(status)
    }
}

/// Searches a fetched target page for a Webmention endpoint, in the
/// order the spec demands: `Link` header, then `<link rel=webmention>`,
/// then `<a rel=webmention>` (spec §4.6 step 1). An empty `href` is a
/// valid endpoint meaning the target page itself.
pub fn discover_webmention_endpoint(result: &FetchResult) -> Option<String> {
    if let Some(header) = &result.link_header {
        if let Some(endpoint) = find_rel(header, "webmention") {
            return Some(endpoint.to_string());
        }
    }

    if !result.is_parseable() {
        return None;
    }
    let body = String::from_utf8_lossy(&result.body);
    let doc = Html::parse_document(&body);

    if let Some(href) = html::find_rel_attr(&doc, "link", "webmention") {
        return Some(href);
    }
    html::find_rel_attr(&doc, "a", "webmention")
}

fn resolve_endpoint(target: &str, raw_endpoint: &str) -> Result<String, CoreError> {
    if raw_endpoint.is_empty() {
        return Ok(target.to_string());
    }
    let base = url::Url::parse(target).map_err(|_| CoreError::InvalidUrl(target.to_string()))?;
    base.join(raw_endpoint)
        .map(|u| u.to_string())
        .map_err(|_| CoreError::InvalidUrl(raw_endpoint.to_string()))
}

/// Dispatches `source=<source>&target=<target>` to `target`'s
/// discovered Webmention endpoint, if any. A missing endpoint is a
/// successful no-op (spec §4.6 step 2). 5xx/network failures get a
/// single retry with backoff; 4xx is permanent (spec §4.6 step 3, §7).
pub async fn send_webmention(
    sink: &dyn WebmentionSink,
    fetcher: &Arc<CachingFetcher>,
    source: &str,
    target: &str,
) -> Result<(), String> {
    let fetched = fetcher.fetch(target).await.map_err(|e| e.to_string())?;

    let Some(raw_endpoint) = discover_webmention_endpoint(&fetched) else {
        info!(target, "no webmention endpoint discovered, skipping");
        return Ok(());
    };
    let endpoint = resolve_endpoint(&fetched.final_url, &raw_endpoint).map_err(|e| e.to_string())?;

    dispatch_with_retry("webmention", &endpoint, || sink.notify(&endpoint, source, target))
        .await
}

/// POSTs `hub.mode=publish&hub.url=<feed_self>` to `hub` (spec §4.6
/// "WebSub ping"). Same retry policy as Webmention.
pub async fn send_websub_ping(hub_client: &dyn WebSubHub, hub: &str, feed_self: &str) -> Result<(), String> {
    dispatch_with_retry("websub", hub, || hub_client.publish(hub, feed_self)).await
}

/// GETs the Wayback save endpoint for `target`. Any 2xx/3xx counts as
/// success; never retried (spec §4.6 "Wayback save").
pub async fn save_to_wayback(archiver: &dyn WaybackArchiver, target: &str) -> Result<(), String> {
    match archiver.save(target).await {
        Ok(status) if (200..400).contains(&status) => {
            info!(target, status, "wayback save accepted");
            Ok(())
        }
        Ok(status) => {
            let message = format!("wayback save for {target} returned HTTP {status}");
            warn!(target, status, "wayback save failed");
            Err(message)
        }
        Err(e) => {
            let message = e.to_string();
            warn!(target, error = %message, "wayback save request failed");
            Err(message)
        }
    }
}

async fn dispatch_with_retry<F, Fut>(kind: &str, endpoint: &str, mut attempt: F) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<u16, CoreError>>,
{
    match attempt().await {
        Ok(status) if (200..300).contains(&status) => {
            info!(kind, endpoint, status, "ping accepted");
            Ok(())
        }
        Ok(status) if (400..500).contains(&status) => {
            let message = format!("{kind} ping to {endpoint} permanently failed: HTTP {status}");
            warn!(kind, endpoint, status, "ping permanently failed, not retrying");
            Err(message)
        }
        Ok(status) => {
            tokio::time::sleep(PING_RETRY_BACKOFF).await;
            match attempt().await {
                Ok(retry_status) if (200..300).contains(&retry_status) => {
                    info!(kind, endpoint, status = retry_status, "ping accepted on retry");
                    Ok(())
                }
                Ok(retry_status) => Err(format!("{kind} ping to {endpoint} failed twice: HTTP {status}, retry HTTP {retry_status}")),
                Err(e) => Err(format!("{kind} ping to {endpoint} failed (HTTP {status}), retry errored: {e}")),
            }
        }
        Err(e) => {
            tokio::time::sleep(PING_RETRY_BACKOFF).await;
            match attempt().await {
                Ok(retry_status) if (200..300).contains(&retry_status) => {
                    info!(kind, endpoint, status = retry_status, "ping accepted on retry");
                    Ok(())
                }
                Ok(retry_status) => Err(format!("{kind} ping to {endpoint} failed: {e}, retry HTTP {retry_status}")),
                Err(retry_err) => Err(format!("{kind} ping to {endpoint} failed twice: {e}, then {retry_err}")),
            }
        }
    }
}
