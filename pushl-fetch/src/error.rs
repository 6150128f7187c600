use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("redirect chain exceeded {0} hops")]
    TooManyRedirects(usize),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server error: HTTP {0}")]
    Server(u16),

    #[error("client error: HTTP {0}")]
    Client(u16),

    /// Surfaced to a caller that joined another task's in-flight fetch
    /// of the same URL, once that fetch has already failed.
    #[error("{0}")]
    Joined(String),
}

impl FetchError {
    /// Whether the error represents a transient condition worth a
    /// single retry, per spec §7 (5xx, timeout, network error).
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Server(_))
            || matches!(self, FetchError::Request(e) if !e.is_status())
    }
}
