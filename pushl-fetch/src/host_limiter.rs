use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Bounds simultaneous outbound requests per host. Semaphores are
/// created lazily on first use for a given host, guarded by a single
/// mutex over the map (spec §9: "per-host caps are a map from host to
/// semaphore, lazily created under a mutex").
pub struct HostLimiter {
    per_host_cap: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    pub fn new(per_host_cap: usize) -> Self {
        Self {
            per_host_cap,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a token for `host`, suspending (cooperatively) until one
    /// is free. The task should hold at most one such token across a
    /// suspension point to avoid self-deadlock (spec §9).
    pub async fn acquire(&self, host: &str) -> OwnedSemaphorePermit {
        let sem = {
            let mut hosts = self.hosts.lock().await;
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_cap)))
                .clone()
        };
        sem.acquire_owned()
            .await
            .expect("host semaphore is never closed")
    }
}
