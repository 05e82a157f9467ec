pub mod error;

pub use error::{BrowserError, Result};

use std::path::PathBuf;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// DevTools messages for a node that left the document between query and read.
const NODE_GONE: &[&str] = &["No node with given id", "Could not find node"];

/// Classify a failed element read by its DevTools message.
fn read_failure(message: String) -> BrowserError {
    if NODE_GONE.iter().any(|m| message.contains(m)) {
        BrowserError::Detached
    } else {
        BrowserError::Protocol(message)
    }
}

/// How to start Chromium.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window. Turn off to log in by hand.
    pub headless: bool,
    /// Explicit browser binary. Falls back to chromiumoxide's detection.
    pub chrome_bin: Option<PathBuf>,
}

/// One browser process with a single tab. Callers must `close()` it; dropping
/// it only aborts the protocol handler and leaves process teardown to
/// chromiumoxide.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref bin) = options.chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "chrome: handler event error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!(headless = options.headless, "ChromeSession launched");

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Load a URL in the session's tab and wait for navigation to settle.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "chrome: navigate");
        self.page.goto(url).await?;
        Ok(())
    }

    /// Location the tab ended up on, after any redirects.
    pub async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }

    pub async fn scroll_to_bottom(&self) -> Result<()> {
        self.page.evaluate(SCROLL_TO_BOTTOM).await?;
        Ok(())
    }

    /// Inner HTML of every element matching `selector`, read one at a time.
    ///
    /// Lazy-loading feeds recycle nodes while we read them, so an element
    /// found by the query may be gone by the time its HTML is requested.
    /// Those reads come back as [`BrowserError::Detached`] in place. Any other
    /// read failure is a [`BrowserError::Protocol`] in its slot.
    pub async fn element_html(&self, selector: &str) -> Result<Vec<Result<String>>> {
        let elements = self.page.find_elements(selector).await?;
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            let read = match element.inner_html().await {
                Ok(Some(html)) => Ok(html),
                Ok(None) => Err(BrowserError::Detached),
                Err(e) => {
                    debug!(selector, error = %e, "chrome: element read failed");
                    Err(read_failure(e.to_string()))
                }
            };
            out.push(read);
        }
        Ok(out)
    }

    /// Shut the browser down and reap the process.
    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "chrome: wait after close failed");
        }
        self.handler.abort();
        closed?;
        info!("ChromeSession closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanished_node_reads_as_detached() {
        assert!(matches!(
            read_failure("Error -32000: No node with given id found".to_string()),
            BrowserError::Detached
        ));
        assert!(matches!(
            read_failure("Could not find node with given id".to_string()),
            BrowserError::Detached
        ));
    }

    #[test]
    fn transport_failures_stay_protocol_errors() {
        for message in ["Request timed out.", "WebSocket connection closed", "Target crashed"] {
            match read_failure(message.to_string()) {
                BrowserError::Protocol(m) => assert_eq!(m, message),
                other => panic!("{message:?} classified as {other:?}"),
            }
        }
    }
}
