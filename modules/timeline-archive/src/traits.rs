// Capability traits for everything the engine talks to.
//
// AccountApi: authenticated client, profile lookup + bulk status lookup.
// TimelineApi: timeline cursor pagination.
// RenderSurface / SessionLauncher: one rendering session, scoped to a crawl.
//
// The engine receives these explicitly, so tests swap in the mocks from
// `testing` with no network and no browser.

use async_trait::async_trait;
use chrome_client::{BrowserError, ChromeSession, LaunchOptions};
use twitter_client::{Status, TwitterClient, TwitterError};

use crate::error::{Result, ScrapeError};
use crate::types::{AccountProfile, PostId};

/// CSS selector for one rendered post.
pub const POST_SELECTOR: &str = "article";

// ---------------------------------------------------------------------------
// API capabilities
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Profile metadata. A missing account is `ScrapeError::AccountNotFound`.
    async fn profile(&self, handle: &str) -> Result<AccountProfile>;

    /// Full statuses for at most 100 ids. Unknown ids are absent from the
    /// result rather than an error.
    async fn lookup(&self, ids: &[PostId]) -> Result<Vec<Status>>;
}

#[async_trait]
pub trait TimelineApi: Send + Sync {
    /// One page of the account's timeline, newest first. `max_id` is
    /// inclusive, so the cursor record comes back again.
    async fn timeline_page(
        &self,
        handle: &str,
        count: u32,
        max_id: Option<&PostId>,
    ) -> Result<Vec<Status>>;
}

#[async_trait]
impl AccountApi for TwitterClient {
    async fn profile(&self, handle: &str) -> Result<AccountProfile> {
        match self.get_user(handle).await {
            Ok(user) => Ok(user.into()),
            Err(TwitterError::NotFound(_)) => Err(ScrapeError::AccountNotFound(handle.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup(&self, ids: &[PostId]) -> Result<Vec<Status>> {
        let ids: Vec<&str> = ids.iter().map(PostId::as_str).collect();
        Ok(self.lookup_statuses(&ids).await?)
    }
}

#[async_trait]
impl TimelineApi for TwitterClient {
    async fn timeline_page(
        &self,
        handle: &str,
        count: u32,
        max_id: Option<&PostId>,
    ) -> Result<Vec<Status>> {
        Ok(self
            .user_timeline(handle, count, max_id.map(PostId::as_str))
            .await?)
    }
}

// ---------------------------------------------------------------------------
// Rendering session
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RenderSurface: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn current_url(&mut self) -> Result<Option<String>>;

    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// HTML of every currently rendered post. A post that was unloaded while
    /// being read is `Err(ScrapeError::StaleElement)` in its slot.
    async fn post_fragments(&mut self) -> Result<Vec<Result<String>>>;

    /// Release the session. Always called, success or not.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderSurface>>;
}

#[async_trait]
impl RenderSurface for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        Ok(ChromeSession::navigate(self, url).await?)
    }

    async fn current_url(&mut self) -> Result<Option<String>> {
        Ok(ChromeSession::current_url(self).await?)
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        Ok(ChromeSession::scroll_to_bottom(self).await?)
    }

    async fn post_fragments(&mut self) -> Result<Vec<Result<String>>> {
        let reads = self.element_html(POST_SELECTOR).await?;
        Ok(reads
            .into_iter()
            .map(|read| match read {
                Ok(html) => Ok(html),
                Err(BrowserError::Detached) => Err(ScrapeError::StaleElement),
                Err(e) => Err(e.into()),
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(ChromeSession::close(*self).await?)
    }
}

/// Launches one headless (or headed, for manual log-in) Chromium per crawl.
pub struct ChromeLauncher {
    options: LaunchOptions,
}

impl ChromeLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSurface>> {
        let session = ChromeSession::launch(&self.options).await?;
        Ok(Box::new(session))
    }
}
