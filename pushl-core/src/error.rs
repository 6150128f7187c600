use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] pushl_fetch::FetchError),

    #[error("feed parse error: {0}")]
    FeedParse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
