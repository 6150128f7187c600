use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk record version. Bump when the field set changes in a
/// way that isn't purely additive; readers reject records from a newer
/// version than they understand by treating them as a cache miss.
pub const RECORD_VERSION: u32 = 1;

/// A cached conditional-GET snapshot for one normalized URL.
///
/// Invariant: a `CacheRecord` exists only after at least one completed
/// fetch attempt. A 304 response reuses `body` and `links` from the
/// prior record and only updates `fetched_at` (and `status`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    /// HTTP status of the last terminal response after redirect chase.
    pub status: u16,
    /// Post-redirect, post-canonical URL.
    pub final_url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    /// Absent if the last terminal response carries no body (e.g. a 304
    /// served from the prior body, recorded separately).
    pub body: Option<Vec<u8>>,
    pub fetched_at: DateTime<Utc>,
    /// Outbound URLs observed on the previous successful fetch, used for
    /// entry-link deletion detection.
    pub links: BTreeSet<String>,
}

impl CacheRecord {
    pub fn new(status: u16, final_url: String) -> Self {
        Self {
            version: RECORD_VERSION,
            status,
            final_url,
            etag: None,
            last_modified: None,
            content_type: None,
            body: None,
            fetched_at: Utc::now(),
            links: BTreeSet::new(),
        }
    }

    /// Apply a 304 response: keep body/links, bump the timestamp and
    /// status.
    pub fn mark_not_modified(&mut self, at: DateTime<Utc>) {
        self.status = 304;
        self.fetched_at = at;
    }
}
