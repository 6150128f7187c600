//! Conditional-GET HTTP fetching layered over `pushl-cache`.
//!
//! Normalizes URLs, deduplicates concurrent fetches of the same URL,
//! follows redirects up to a bounded depth while tracking any
//! HTTP-level canonical link, and enforces per-host concurrency.

mod error;
mod fetcher;
mod host_limiter;
mod link_header;
mod normalize;
mod result;

pub use error::{FetchError, Result};
pub use fetcher::CachingFetcher;
pub use link_header::find_rel;
pub use normalize::{host_of, normalize};
pub use result::FetchResult;
