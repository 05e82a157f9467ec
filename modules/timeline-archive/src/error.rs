use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Result type alias for acquisition operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("This user does not exist: @{0}")]
    AccountNotFound(String),

    #[error("Cannot scrape @{0}: the account is private and not followed by this API account")]
    AccountPrivate(String),

    #[error("Rendered element went stale before it could be read")]
    StaleElement,

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("API call failed: {0}")]
    Api(#[from] twitter_client::TwitterError),

    #[error("Browser failed: {0}")]
    Browser(#[from] chrome_client::BrowserError),

    #[error("Store I/O failed for {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrapeError {
    /// Access errors end the run before any discovery work.
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            ScrapeError::AccountNotFound(_) | ScrapeError::AccountPrivate(_)
        )
    }
}
