use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Element detached from the document")]
    Detached,
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Protocol(err.to_string())
    }
}
