// Windowed crawl discovery: rendered search results, one date window at a time,
// scrolling each window until the set of visible posts stops changing.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::parser::IdentifierParser;
use crate::traits::RenderSurface;
use crate::types::{DateRange, DiscoveryWindow, IdentifierSet};

const DATE_FORMAT: &str = "%Y-%m-%d";
const LOGIN_PATH: &str = "/i/flow/login";

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub window_days: u32,
    pub load_delay: Duration,
    pub login_wait: Duration,
    pub max_scrolls: usize,
    pub search_url: String,
}

pub struct WindowedCrawl<'a> {
    handle: &'a str,
    parser: IdentifierParser,
    settings: CrawlSettings,
}

impl<'a> WindowedCrawl<'a> {
    pub fn new(handle: &'a str, settings: CrawlSettings) -> Self {
        Self {
            handle,
            parser: IdentifierParser::for_handle(handle),
            settings,
        }
    }

    /// Crawl every window of `range` on `surface`, returning all identifiers
    /// seen. The caller owns the session and closes it.
    pub async fn discover(
        &self,
        surface: &mut dyn RenderSurface,
        range: &DateRange,
    ) -> Result<IdentifierSet> {
        let windows = DiscoveryWindow::partition(range, self.settings.window_days);
        info!(handle = self.handle, windows = windows.len(), "starting windowed crawl");

        let mut ids = IdentifierSet::new();
        for window in &windows {
            let found = self.crawl_window(surface, window, &mut ids).await?;
            if found == 0 {
                info!(window = %window, "no posts in time period");
            }
            info!(window = %window, total = ids.len(), "posts found so far");
        }

        Ok(ids)
    }

    /// Load one window and scroll it to exhaustion, adding everything parsed
    /// to `ids` as soon as it is seen. Returns the size of the final pass.
    async fn crawl_window(
        &self,
        surface: &mut dyn RenderSurface,
        window: &DiscoveryWindow,
        ids: &mut IdentifierSet,
    ) -> Result<usize> {
        let url = self.search_url(window)?;
        debug!(url = %url, "requesting search window");
        surface.navigate(url.as_str()).await?;
        pause(self.settings.load_delay).await;

        if self.behind_login_wall(surface).await? {
            warn!(
                wait_secs = self.settings.login_wait.as_secs(),
                "search redirected to a log-in page; log in through the browser window (run with --debug) before the wait ends"
            );
            pause(self.settings.login_wait).await;
            surface.navigate(url.as_str()).await?;
            pause(self.settings.load_delay).await;

            if self.behind_login_wall(surface).await? {
                warn!(window = %window, "still behind log-in wall, results for this window may be incomplete");
            }
        }

        // Posts can be unloaded by later scrolls, so every pass is merged
        // into `ids` immediately.
        let mut first_pass = self.parser.parse_fragments(surface.post_fragments().await?)?;
        ids.extend(first_pass.iter().cloned());

        let mut scrolls = 0usize;
        loop {
            surface.scroll_to_bottom().await?;
            pause(self.settings.load_delay).await;
            scrolls += 1;

            let second_pass = self.parser.parse_fragments(surface.post_fragments().await?)?;
            ids.extend(second_pass.iter().cloned());

            if second_pass == first_pass {
                debug!(window = %window, scrolls, "window content stabilized");
                return Ok(second_pass.len());
            }
            if scrolls >= self.settings.max_scrolls {
                warn!(window = %window, scrolls, "scroll limit reached before content stabilized");
                return Ok(second_pass.len());
            }
            first_pass = second_pass;
        }
    }

    async fn behind_login_wall(&self, surface: &mut dyn RenderSurface) -> Result<bool> {
        Ok(surface
            .current_url()
            .await?
            .as_deref()
            .is_some_and(is_login_wall))
    }

    /// Search URL for "from this account, inside this window, reshares included".
    pub(crate) fn search_url(&self, window: &DiscoveryWindow) -> Result<Url> {
        let query = format!(
            "from:{} since:{} until:{} include:retweets",
            self.handle,
            window.since.format(DATE_FORMAT),
            window.until.format(DATE_FORMAT),
        );
        let url = Url::parse_with_params(
            &self.settings.search_url,
            &[("q", query.as_str()), ("f", "live"), ("src", "typd")],
        )
        .map_err(|e| anyhow::anyhow!("invalid search URL {}: {e}", self.settings.search_url))?;
        Ok(url)
    }
}

/// True when `location` is the log-in flow search redirects to.
pub(crate) fn is_login_wall(location: &str) -> bool {
    Url::parse(location)
        .map(|u| u.path().starts_with(LOGIN_PATH))
        .unwrap_or(false)
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn settings() -> CrawlSettings {
        CrawlSettings {
            window_days: 7,
            load_delay: Duration::ZERO,
            login_wait: Duration::ZERO,
            max_scrolls: 50,
            search_url: "https://twitter.com/search".to_string(),
        }
    }

    #[test]
    fn search_url_encodes_query() {
        let crawl = WindowedCrawl::new("jack", settings());
        let window = DiscoveryWindow {
            since: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2020, 1, 8).unwrap(),
            width_days: 7,
        };

        let url = crawl.search_url(&window).unwrap();
        let q = url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        assert_eq!(url.path(), "/search");
        assert_eq!(q, "from:jack since:2020-01-01 until:2020-01-08 include:retweets");
    }

    #[test]
    fn login_flow_is_detected() {
        assert!(is_login_wall("https://twitter.com/i/flow/login"));
        assert!(is_login_wall("https://x.com/i/flow/login?redirect_after_login=%2Fsearch"));
        assert!(!is_login_wall("https://twitter.com/search?q=from%3Ajack"));
        assert!(!is_login_wall("not a url"));
    }
}
