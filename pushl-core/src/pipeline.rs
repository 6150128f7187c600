//! Wires the fetcher, scheduler, and the C4/C5/C6 task bodies together
//! into one engine a binary can seed and drain to quiescence.

use std::sync::Arc;

use tracing::warn;

use pushl_fetch::CachingFetcher;
use pushl_scheduler::{Scheduler, TaskKey, TaskKind};

use crate::config::ProcessingConfig;
use crate::entry;
use crate::feed;
use crate::ping::{self, WaybackArchiver, WebSubHub, WebmentionSink};

pub struct Pipeline {
    fetcher: Arc<CachingFetcher>,
    scheduler: Arc<Scheduler>,
    config: ProcessingConfig,
    webmention_sink: Arc<dyn WebmentionSink>,
    websub_hub: Arc<dyn WebSubHub>,
    wayback_archiver: Arc<dyn WaybackArchiver>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<CachingFetcher>,
        scheduler: Arc<Scheduler>,
        config: ProcessingConfig,
        webmention_sink: Arc<dyn WebmentionSink>,
        websub_hub: Arc<dyn WebSubHub>,
        wayback_archiver: Arc<dyn WaybackArchiver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            fetcher,
            scheduler,
            config,
            webmention_sink,
            websub_hub,
            wayback_archiver,
        })
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Seed a URL as a feed (the default CLI mode).
    pub async fn seed_feed(self: &Arc<Self>, url: String) {
        self.submit_feed(url).await;
    }

    /// Seed a URL as an entry directly (`-e` flag, spec §6).
    pub async fn seed_entry(self: &Arc<Self>, url: String) {
        self.submit_entry(url).await;
    }

    async fn submit_feed(self: &Arc<Self>, url: String) {
        let key = TaskKey::new(TaskKind::Feed, url.clone());
        let pipeline = Arc::clone(self);
        self.scheduler
            .submit(key, move || async move { pipeline.run_feed(url).await })
            .await;
    }

    async fn submit_entry(self: &Arc<Self>, url: String) {
        let key = TaskKey::new(TaskKind::Entry, url.clone());
        let pipeline = Arc::clone(self);
        self.scheduler
            .submit(key, move || async move { pipeline.run_entry(url).await })
            .await;
    }

    async fn submit_websub_ping(self: &Arc<Self>, hub: String, feed_self: String) {
        let key = TaskKey::new(TaskKind::WebSubPing, format!("{hub}|{feed_self}"));
        let hub_client = Arc::clone(&self.websub_hub);
        self.scheduler
            .submit(key, move || async move {
                ping::send_websub_ping(hub_client.as_ref(), &hub, &feed_self).await
            })
            .await;
    }

    async fn submit_webmention_ping(self: &Arc<Self>, source: String, target: String) {
        let key = TaskKey::new(TaskKind::WebmentionPing, format!("{source}|{target}"));
        let sink = Arc::clone(&self.webmention_sink);
        let fetcher = Arc::clone(&self.fetcher);
        self.scheduler
            .submit(key, move || async move {
                ping::send_webmention(sink.as_ref(), &fetcher, &source, &target).await
            })
            .await;
    }

    async fn submit_wayback_save(self: &Arc<Self>, target: String) {
        let key = TaskKey::new(TaskKind::WaybackSave, target.clone());
        let archiver = Arc::clone(&self.wayback_archiver);
        self.scheduler
            .submit(key, move || async move { ping::save_to_wayback(archiver.as_ref(), &target).await })
            .await;
    }

    async fn run_feed(self: &Arc<Self>, url: String) -> Result<(), String> {
        let fetched = self.fetcher.fetch(&url).await.map_err(|e| e.to_string())?;

        if !fetched.is_parseable() {
            return Ok(());
        }

        let snapshot = match feed::parse(&fetched.body, fetched.content_type.as_deref(), &fetched.final_url) {
            Ok(s) => s,
            Err(e) => {
                warn!(url, error = %e, "feed parse error, treating as success with no derived work");
                return Ok(());
            }
        };

        // Pragmatic rule (spec §4.4 step 5): ping the hub iff this fetch
        // was not served from cache. Entries and archive pages are still
        // submitted unconditionally so they can self-determine freshness
        // via their own conditional GET.
        if !fetched.served_from_cache {
            if let Some(feed_self) = &snapshot.self_url {
                for hub in &snapshot.hub_urls {
                    self.submit_websub_ping(hub.clone(), feed_self.clone()).await;
                }
            }
        }

        if !self.config.is_websub_only(&url) {
            for item_url in &snapshot.item_urls {
                self.submit_entry(item_url.clone()).await;
            }
        }

        if self.config.archive {
            for archive_url in &snapshot.archive_urls {
                self.submit_feed(archive_url.clone()).await;
            }
        }

        Ok(())
    }

    async fn run_entry(self: &Arc<Self>, url: String) -> Result<(), String> {
        let fetched = self.fetcher.fetch(&url).await.map_err(|e| e.to_string())?;

        if !fetched.is_parseable() {
            return Ok(());
        }

        // An unchanged entry carries no new mention-worthy information;
        // its cached link set and timestamps were already handled by
        // the fetcher, so there is nothing further to derive or ping
        // (spec §8 round-trip property: an unchanged run produces zero
        // outbound POSTs).
        if fetched.served_from_cache {
            return Ok(());
        }

        let snapshot = match entry::parse(&fetched.body, &fetched.final_url, fetched.canonical_url.as_deref()) {
            Ok(s) => s,
            Err(e) => {
                warn!(url, error = %e, "entry parse error, treating as success with no derived work");
                return Ok(());
            }
        };

        self.fetcher.store_links(&url, snapshot.links.clone()).await;

        let targets: std::collections::BTreeSet<String> =
            fetched.previous_links.union(&snapshot.links).cloned().collect();

        for target in targets {
            self.submit_webmention_ping(snapshot.source.clone(), target.clone()).await;
            if self.config.wayback {
                self.submit_wayback_save(target).await;
            }
        }

        if self.config.recurse {
            for feed_url in &snapshot.feed_links {
                self.submit_feed(feed_url.clone()).await;
            }
        }

        Ok(())
    }
}
