use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::task::TaskKey;

/// The work registry: a dedup-by-key task pool with dynamic submission,
/// quiescence detection, and failure accounting.
///
/// Dedup state lives for the lifetime of the `Scheduler`, not just while
/// a task is in flight — a resubmit of an already-completed key within
/// the same process run is a permanent no-op, not just a join against a
/// still-running future (spec §4.3: "if the first task has already
/// completed within this process run, a resubmit is a no-op").
pub struct Scheduler {
    known: Mutex<HashSet<TaskKey>>,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    notify: Notify,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            known: Mutex::new(HashSet::new()),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            notify: Notify::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// The single top-level cancellation token (spec §5). Task bodies
    /// should `tokio::select!` their suspension points against
    /// `token.cancelled()`.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation of all outstanding and future work.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn submitted_count(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Submit a unit of work identified by `key`. Idempotent: if `key`
    /// was already submitted (whether still running or long completed)
    /// in this process run, this is a no-op — the caller does not spawn
    /// a second task and gets no result back (spec §4.3: submit is
    /// fire-and-forget, dedup is by presence alone).
    ///
    /// Requires an `Arc<Self>` receiver so the spawned task can hold its
    /// own reference to the scheduler to report completion.
    ///
    /// Race safety: the admitted-submission counter is incremented
    /// synchronously, before this function returns, and *before* the
    /// task is spawned. A task body that calls `submit` on children and
    /// then `.await`s them to completion before returning therefore
    /// guarantees every child's submitted-increment happens-before its
    /// own completed-increment — satisfying the quiescence race in
    /// spec §4.3 ("a completing task submits new work just before
    /// marking itself complete") without any extra bookkeeping.
    pub async fn submit<F, Fut>(self: &Arc<Self>, key: TaskKey, thunk: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        {
            let mut known = self.known.lock().expect("scheduler mutex poisoned");
            if !known.insert(key.clone()) {
                debug!(%key, "submit: key already known, skipping");
                return;
            }
        }

        self.submitted.fetch_add(1, Ordering::SeqCst);
        debug!(%key, "task submitted");

        let scheduler = Arc::clone(self);
        let cancel = self.cancel.clone();
        let spawn_key = key.clone();
        tokio::spawn(async move {
            debug!(key = %spawn_key, "task started");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err("cancelled".to_string()),
                result = thunk() => result,
            };
            match &outcome {
                Ok(()) => info!(key = %spawn_key, "task done"),
                Err(error) => {
                    scheduler.failed.fetch_add(1, Ordering::SeqCst);
                    warn!(key = %spawn_key, %error, "task failed");
                }
            }
            scheduler.completed.fetch_add(1, Ordering::SeqCst);
            scheduler.notify.notify_waiters();
        });
    }

    /// Returns once every submitted task (transitively) has reached a
    /// terminal state. Race-free against concurrent completions: the
    /// `Notified` future is pinned and *enabled* — registering it as a
    /// waiter — before the submitted/completed counters are compared.
    /// `notify_waiters()` wakes only already-registered waiters and
    /// stores no permit, so registering after the comparison would let
    /// a completion landing in between go unobserved and block forever;
    /// enabling first closes that window.
    pub async fn await_quiescent(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.submitted.load(Ordering::SeqCst) == self.completed.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}
