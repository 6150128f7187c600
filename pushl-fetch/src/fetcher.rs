use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use reqwest::header::{HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, LOCATION};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use pushl_cache::{CacheRecord, CacheStore};

use crate::error::{FetchError, Result};
use crate::host_limiter::HostLimiter;
use crate::link_header::find_rel;
use crate::normalize::{host_of, normalize};
use crate::result::FetchResult;

const MAX_REDIRECTS: usize = 10;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// A fetch in flight, joined by every caller racing on the same
/// normalized URL. The output is `Result<FetchResult, String>` rather
/// than `Result<FetchResult, FetchError>` because `Shared` requires a
/// `Clone` output and `FetchError` wraps non-`Clone` `reqwest::Error`;
/// the `String` carries the error's `Display` text to joined waiters,
/// who get back a `FetchError::Joined`.
type InflightFetch = Shared<BoxFuture<'static, std::result::Result<FetchResult, String>>>;

/// Wraps a `reqwest::Client` with conditional-GET caching, bounded
/// redirect chasing, canonical-URL tracking, per-host concurrency
/// limiting, and in-flight fetch deduplication.
///
/// A `url` referenced by N concurrently-running tasks is fetched at
/// most once: the second and later callers await the first's result
/// rather than issuing their own request (spec §4.2, §8).
pub struct CachingFetcher {
    client: reqwest::Client,
    cache: Arc<CacheStore>,
    host_limiter: HostLimiter,
    global_limiter: Arc<Semaphore>,
    user_agent: String,
    inflight: Mutex<HashMap<String, InflightFetch>>,
}

impl CachingFetcher {
    pub fn new(
        cache: Arc<CacheStore>,
        user_agent: String,
        per_host_cap: usize,
        global_cap: usize,
        connect_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(total_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            cache,
            host_limiter: HostLimiter::new(per_host_cap),
            global_limiter: Arc::new(Semaphore::new(global_cap)),
            user_agent,
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// POST `application/x-www-form-urlencoded` `fields` to `url`,
    /// bypassing the cache (pings are one-shot side effects, never
    /// conditional). Returns the response status; the caller decides
    /// success/retry policy from it (spec §4.6, §7).
    pub async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<u16> {
        let host = host_of(url).unwrap_or_default();
        let _global = self.global_limiter.acquire().await.expect("semaphore never closed");
        let _host = self.host_limiter.acquire(&host).await;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        let response = self
            .client
            .post(url)
            .header(reqwest::header::USER_AGENT, self.user_agent.clone())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { FetchError::Timeout } else { FetchError::Request(e) })?;

        Ok(response.status().as_u16())
    }

    /// GET `url` with no conditional headers and no cache write,
    /// discarding the body. Used for Wayback Machine save requests
    /// (spec §4.6), which are fire-and-forget and never retried.
    pub async fn get_uncached(&self, url: &str) -> Result<u16> {
        let host = host_of(url).unwrap_or_default();
        let _global = self.global_limiter.acquire().await.expect("semaphore never closed");
        let _host = self.host_limiter.acquire(&host).await;

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.user_agent.clone())
            .send()
            .await
            .map_err(|e| if e.is_timeout() { FetchError::Timeout } else { FetchError::Request(e) })?;

        Ok(response.status().as_u16())
    }

    /// Fetch `url`, deduplicating concurrent fetches of the same
    /// normalized URL and serving a conditional GET against the cache
    /// when a prior record exists. Requires an `Arc<Self>` receiver so
    /// the in-flight future can outlive the calling stack frame while
    /// other callers join it.
    pub async fn fetch(self: &Arc<Self>, url: &str) -> Result<FetchResult> {
        let key = normalize(url)?;

        let shared = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(&key) {
                existing.clone()
            } else {
                let this = Arc::clone(self);
                let this_key = key.clone();
                let fut: BoxFuture<'static, std::result::Result<FetchResult, String>> =
                    Box::pin(async move { this.fetch_uncached(&this_key).await.map_err(|e| e.to_string()) });
                let shared = fut.shared();
                inflight.insert(key.clone(), shared.clone());
                shared
            }
        };

        let result = shared.await;
        self.inflight.lock().await.remove(&key);
        result.map_err(FetchError::Joined)
    }

    async fn fetch_uncached(&self, url: &str) -> Result<FetchResult> {
        let host = host_of(url).unwrap_or_default();
        let _global = self.global_limiter.acquire().await.expect("semaphore never closed");
        let _host = self.host_limiter.acquire(&host).await;

        let prior = self.cache.get(url).await;

        match self.fetch_chain(url, prior.as_ref()).await {
            Ok(Outcome::NotModified { record }) => {
                let result = FetchResult {
                    final_url: record.final_url.clone(),
                    status: 304,
                    content_type: record.content_type.clone(),
                    body: record.body.clone().unwrap_or_default(),
                    served_from_cache: true,
                    previous_links: record.links.clone(),
                    canonical_url: None,
                    link_header: None,
                };
                let mut updated = record;
                updated.mark_not_modified(Utc::now());
                if let Err(e) = self.cache.put(url, &updated).await {
                    warn!(url, error = %e, "failed to persist cache timestamp bump");
                }
                Ok(result)
            }
            Ok(Outcome::Fetched {
                final_url,
                status,
                etag,
                last_modified,
                content_type,
                body,
                canonical_url,
                link_header,
            }) => {
                let previous_links = prior.map(|r| r.links).unwrap_or_default();
                let mut record = CacheRecord::new(status, final_url.clone());
                record.etag = etag;
                record.last_modified = last_modified;
                record.content_type = content_type.clone();
                record.body = Some(body.clone());
                record.links = previous_links.clone();
                if let Err(e) = self.cache.put(url, &record).await {
                    warn!(url, error = %e, "failed to persist cache record");
                }
                info!(url, status, bytes = body.len(), "fetched");
                Ok(FetchResult {
                    final_url,
                    status,
                    content_type,
                    body,
                    served_from_cache: false,
                    previous_links,
                    canonical_url,
                    link_header,
                })
            }
            Err(e) => {
                if let Some(mut record) = self.cache.get(url).await {
                    record.fetched_at = Utc::now();
                    if let FetchError::Client(status) | FetchError::Server(status) = &e {
                        record.status = *status;
                    }
                    if let Err(put_err) = self.cache.put(url, &record).await {
                        warn!(url, error = %put_err, "failed to bump cache timestamp after error");
                    }
                }
                warn!(url, error = %e, "fetch failed");
                Err(e)
            }
        }
    }

    /// Persist a caller-derived link set back onto the cache record for
    /// `url` (spec §4.2 step 5: "replace `links` with whatever the
    /// caller derives and stores back").
    pub async fn store_links(&self, url: &str, links: BTreeSet<String>) {
        let key = match normalize(url) {
            Ok(k) => k,
            Err(_) => return,
        };
        if let Some(mut record) = self.cache.get(&key).await {
            record.links = links;
            if let Err(e) = self.cache.put(&key, &record).await {
                warn!(url = %key, error = %e, "failed to persist updated link set");
            }
        }
    }

    async fn fetch_chain(&self, start_url: &str, prior: Option<&CacheRecord>) -> Result<Outcome> {
        let mut current = start_url.to_string();
        let mut canonical_url = None;
        let mut link_header = None;

        for hop in 0..MAX_REDIRECTS {
            let conditional = hop == 0 && prior.map(|r| r.body.is_some()).unwrap_or(false);
            let response = match self
                .issue_request(&current, if conditional { prior } else { None })
                .await
            {
                Ok(response) if response.status().is_server_error() => {
                    return Err(self.retry_on_server_error(&current, conditional, prior).await);
                }
                Ok(response) => response,
                Err(e) if e.is_transient() => {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    self.issue_request(&current, if conditional { prior } else { None })
                        .await?
                }
                Err(e) => return Err(e),
            };

            if let Some(raw_link_header) = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
            {
                if let Some(canon) = find_rel(raw_link_header, "canonical") {
                    canonical_url = Some(canon.to_string());
                }
                link_header = Some(raw_link_header.to_string());
            }

            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| FetchError::InvalidUrl(format!("{current} (redirect with no Location)")))?;
                current = resolve(&current, &location)?;
                continue;
            }

            if status.as_u16() == 304 {
                let record = prior
                    .cloned()
                    .expect("304 only issued when a conditional request was sent against a prior record");
                return Ok(Outcome::NotModified { record });
            }

            if status.is_client_error() {
                return Err(FetchError::Client(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let last_modified = response
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes().await?.to_vec();

            return Ok(Outcome::Fetched {
                final_url: current,
                status: status.as_u16(),
                etag,
                last_modified,
                content_type,
                body,
                canonical_url,
                link_header,
            });
        }

        Err(FetchError::TooManyRedirects(MAX_REDIRECTS))
    }

    /// Single retry with a short fixed backoff on a transient server
    /// error, per spec §7.
    async fn retry_on_server_error(
        &self,
        url: &str,
        conditional: bool,
        prior: Option<&CacheRecord>,
    ) -> FetchError {
        tokio::time::sleep(RETRY_BACKOFF).await;
        match self
            .issue_request(url, if conditional { prior } else { None })
            .await
        {
            Ok(response) => FetchError::Server(response.status().as_u16()),
            Err(e) => e,
        }
    }

    async fn issue_request(
        &self,
        url: &str,
        conditional_against: Option<&CacheRecord>,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.user_agent.clone());

        if let Some(record) = conditional_against {
            if let Some(etag) = &record.etag {
                if let Ok(value) = HeaderValue::from_str(etag) {
                    builder = builder.header(IF_NONE_MATCH, value);
                }
            }
            if let Some(last_modified) = &record.last_modified {
                if let Ok(value) = HeaderValue::from_str(last_modified) {
                    builder = builder.header(IF_MODIFIED_SINCE, value);
                }
            }
        }

        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Request(e)
            }
        })
    }
}

enum Outcome {
    NotModified {
        record: CacheRecord,
    },
    Fetched {
        final_url: String,
        status: u16,
        etag: Option<String>,
        last_modified: Option<String>,
        content_type: Option<String>,
        body: Vec<u8>,
        canonical_url: Option<String>,
        link_header: Option<String>,
    },
}

fn resolve(base: &str, location: &str) -> Result<String> {
    let base = url::Url::parse(base).map_err(|_| FetchError::InvalidUrl(base.to_string()))?;
    let resolved = base
        .join(location)
        .map_err(|_| FetchError::InvalidUrl(location.to_string()))?;
    Ok(resolved.to_string())
}
