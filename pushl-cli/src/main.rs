//! Command-line front end: flag parsing, seeding the initial URL set,
//! process wiring, and exit-code reporting (spec §6). Everything else
//! lives in `pushl-core`/`pushl-fetch`/`pushl-cache`/`pushl-scheduler`;
//! this binary only assembles them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pushl_cache::CacheStore;
use pushl_core::{FetcherPingClient, Pipeline, ProcessingConfig};
use pushl_fetch::CachingFetcher;
use pushl_scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "pushl")]
#[command(about = "Notify WebSub hubs, Webmention endpoints, and the Wayback Machine about feed and entry updates")]
#[command(version)]
struct Cli {
    /// Cache directory; absent disables all caching (spec §6 `-c`)
    #[arg(short = 'c', long = "cache")]
    cache: Option<PathBuf>,

    /// Treat every given URL as an entry rather than a feed (spec §6 `-e`)
    #[arg(short = 'e')]
    entries: bool,

    /// Recurse into autodiscovered feeds (spec §6 `-r`)
    #[arg(short = 'r')]
    recurse: bool,

    /// Perform RFC 5005 archive backfill (spec §6 `-a`)
    #[arg(short = 'a')]
    archive: bool,

    /// A URL that is WebSub-only: webmention dispatch is suppressed for
    /// entries discovered from it. Repeatable (spec §6 `-s <url>...`).
    #[arg(short = 's')]
    websub_only: Vec<String>,

    /// Enqueue Wayback Machine archival for every linked target (spec §6 `-k`)
    #[arg(short = 'k')]
    wayback: bool,

    /// Increase logging verbosity; repeatable (spec §6 `-v`/`-vv`)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the default `Pushl/<version>` user-agent string
    #[arg(long = "user-agent")]
    user_agent: Option<String>,

    /// Per-request timeout, in seconds
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Feed or entry URLs to seed (spec §6: "Positional arguments are URLs")
    urls: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let base = match verbose {
        0 => "pushl=info",
        1 => "pushl=debug",
        _ => "pushl=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wires the engine together and drives it to quiescence. Returns
/// `Ok(true)` iff every submitted task succeeded (spec §6 exit code:
/// "0 if all tasks succeeded; nonzero if any failed"); configuration
/// errors (spec §7: "fail fast before any task is submitted") surface
/// as `Err` before any work is admitted.
async fn run(cli: Cli) -> Result<bool> {
    if cli.urls.is_empty() {
        anyhow::bail!("no URLs given; pass one or more feed or entry URLs");
    }

    let config = ProcessingConfig {
        cache_dir: cli.cache.clone(),
        recurse: cli.recurse,
        archive: cli.archive,
        websub_only: cli.websub_only.into_iter().collect(),
        wayback: cli.wayback,
        user_agent: cli
            .user_agent
            .unwrap_or_else(|| format!("Pushl/{}", env!("CARGO_PKG_VERSION"))),
        per_host_cap: 4,
        global_cap: 100,
        connect_timeout: Duration::from_secs(10),
        total_timeout: cli.timeout.map(Duration::from_secs).unwrap_or(Duration::from_secs(30)),
    };

    if let Some(dir) = &config.cache_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("cache directory {} is not usable", dir.display()))?;
    }

    let cache = match &config.cache_dir {
        Some(dir) => CacheStore::open(dir)
            .await
            .with_context(|| format!("opening cache at {}", dir.display()))?,
        None => CacheStore::disabled(),
    };
    let cache = Arc::new(cache);

    let fetcher = Arc::new(
        CachingFetcher::new(
            cache,
            config.user_agent.clone(),
            config.per_host_cap,
            config.global_cap,
            config.connect_timeout,
            config.total_timeout,
        )
        .context("building HTTP client")?,
    );

    let scheduler = Scheduler::new();
    let ping_client = Arc::new(FetcherPingClient::new(Arc::clone(&fetcher)));
    let entries_mode = cli.entries;

    let pipeline = Pipeline::new(
        fetcher,
        Arc::clone(&scheduler),
        config,
        ping_client.clone(),
        ping_client.clone(),
        ping_client,
    );

    let cancel = scheduler.token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, stopping admission of new tasks");
            cancel.cancel();
        }
    });

    for url in cli.urls {
        if entries_mode {
            pipeline.seed_entry(url).await;
        } else {
            pipeline.seed_feed(url).await;
        }
    }

    scheduler.await_quiescent().await;
    ctrl_c.abort();

    let failed = scheduler.failed_count();
    if failed > 0 {
        error!(failed, submitted = scheduler.submitted_count(), "run completed with failures");
    } else {
        info!(submitted = scheduler.submitted_count(), "run completed");
    }

    Ok(failed == 0)
}
