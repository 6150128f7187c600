//! Feed processing, entry processing, and endpoint discovery & ping
//! dispatch — the task bodies that run inside the scheduler and call
//! the caching fetcher (spec components C4, C5, C6).

mod config;
mod entry;
mod error;
mod feed;
mod html;
mod pipeline;
mod ping;

pub use config::ProcessingConfig;
pub use entry::EntrySnapshot;
pub use error::{CoreError, Result};
pub use feed::FeedSnapshot;
pub use pipeline::Pipeline;
pub use ping::{
    discover_webmention_endpoint, FetcherPingClient, WaybackArchiver, WebSubHub, WebmentionSink,
};
