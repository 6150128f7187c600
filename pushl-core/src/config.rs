use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable processing configuration, fixed for the lifetime of a
/// process run (spec §3 "ProcessingConfig").
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub cache_dir: Option<PathBuf>,
    pub recurse: bool,
    pub archive: bool,
    pub websub_only: BTreeSet<String>,
    pub wayback: bool,
    pub user_agent: String,
    pub per_host_cap: usize,
    pub global_cap: usize,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            recurse: false,
            archive: false,
            websub_only: BTreeSet::new(),
            wayback: false,
            user_agent: format!("Pushl/{}", env!("CARGO_PKG_VERSION")),
            per_host_cap: 4,
            global_cap: 100,
            connect_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(30),
        }
    }
}

impl ProcessingConfig {
    /// Whether webmention dispatch should be suppressed for entries
    /// discovered from `feed_url` (spec §9 open question: `-s` binds
    /// only to URLs explicitly named on the command line, not to
    /// children autodiscovered from them).
    pub fn is_websub_only(&self, feed_url: &str) -> bool {
        self.websub_only.contains(feed_url)
    }
}
