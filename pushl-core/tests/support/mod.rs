//! Shared scaffolding for the end-to-end scenario tests (spec §8).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pushl_cache::CacheStore;
use pushl_core::{CoreError, FetcherPingClient, Pipeline, ProcessingConfig, WaybackArchiver};
use pushl_fetch::CachingFetcher;
use pushl_scheduler::Scheduler;

pub fn build_config(cache_dir: &std::path::Path) -> ProcessingConfig {
    ProcessingConfig {
        cache_dir: Some(cache_dir.to_path_buf()),
        ..ProcessingConfig::default()
    }
}

/// Wires a `Pipeline` against a real cache directory and the shared
/// fetcher, using the fetcher-backed ping client for both Webmention
/// and WebSub (so wiremock sees real HTTP traffic), and a counting
/// in-memory stub for Wayback (archive.org can't be wiremocked).
pub async fn pipeline(dir: &std::path::Path, config: ProcessingConfig) -> (Arc<Pipeline>, Arc<CountingWayback>) {
    let cache = Arc::new(CacheStore::open(dir).await.unwrap());
    let fetcher = Arc::new(
        CachingFetcher::new(
            cache,
            config.user_agent.clone(),
            config.per_host_cap,
            config.global_cap,
            config.connect_timeout,
            config.total_timeout,
        )
        .unwrap(),
    );
    let scheduler = Scheduler::new();
    let ping_client = Arc::new(FetcherPingClient::new(Arc::clone(&fetcher)));
    let wayback = Arc::new(CountingWayback::default());

    let pipeline = Pipeline::new(
        fetcher,
        scheduler,
        config,
        ping_client.clone(),
        ping_client,
        wayback.clone(),
    );
    (pipeline, wayback)
}

#[derive(Default)]
pub struct CountingWayback {
    pub saves: AtomicUsize,
}

#[async_trait]
impl WaybackArchiver for CountingWayback {
    async fn save(&self, _target: &str) -> Result<u16, CoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(200)
    }
}

pub async fn drain(pipeline: &Arc<Pipeline>) {
    tokio::time::timeout(Duration::from_secs(10), pipeline.scheduler().await_quiescent())
        .await
        .expect("scheduler did not reach quiescence in time");
}
