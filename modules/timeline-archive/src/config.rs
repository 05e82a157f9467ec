use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use twitter_client::Credentials;

/// Secrets and environment-specific values, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Chromium binary override for the windowed crawl.
    pub chrome_bin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            credentials: Credentials {
                consumer_key: required_env("TWITTER_CONSUMER_KEY")?,
                consumer_secret: required_env("TWITTER_CONSUMER_SECRET")?,
                access_token: required_env("TWITTER_ACCESS_TOKEN")?,
                access_token_secret: required_env("TWITTER_ACCESS_TOKEN_SECRET")?,
            },
            chrome_bin: std::env::var("CHROME_BIN").ok(),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }

        let c = &self.credentials;
        tracing::info!("Config loaded:");
        tracing::info!("  TWITTER_CONSUMER_KEY: {}", preview(&c.consumer_key));
        tracing::info!("  TWITTER_CONSUMER_SECRET: {}", preview(&c.consumer_secret));
        tracing::info!("  TWITTER_ACCESS_TOKEN: {}", preview(&c.access_token));
        tracing::info!("  TWITTER_ACCESS_TOKEN_SECRET: {}", preview(&c.access_token_secret));
        tracing::info!(
            "  CHROME_BIN: {}",
            self.chrome_bin.as_deref().unwrap_or("<not set>")
        );
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} environment variable is required"))
}

/// Tunables for one acquisition run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Accounts with at most this many posts are fully reachable through the
    /// timeline endpoint.
    pub bulk_threshold: u64,
    /// Records requested per timeline page.
    pub page_size: u32,
    /// Identifiers per bulk lookup call.
    pub batch_size: usize,
    /// Pause between lookup calls.
    pub api_delay: Duration,
    /// Width of each crawl window in days.
    pub window_days: u32,
    /// Time given to a rendered page to load after navigation or a scroll.
    pub load_delay: Duration,
    /// Pause for a manual log-in when search hits a login wall.
    pub login_wait: Duration,
    /// Upper bound on scrolls per window.
    pub max_scrolls: usize,
    /// Rendered search endpoint.
    pub search_url: String,
    /// Directory holding `<handle>.json`.
    pub out_dir: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            bulk_threshold: 3200,
            page_size: 200,
            batch_size: 100,
            api_delay: Duration::from_secs(6),
            window_days: 7,
            load_delay: Duration::from_secs(3),
            login_wait: Duration::from_secs(15),
            max_scrolls: 500,
            search_url: "https://twitter.com/search".to_string(),
            out_dir: PathBuf::from("."),
        }
    }
}

impl ScrapeConfig {
    /// Timeline pages needed to cover everything below the bulk threshold.
    pub fn max_pages(&self) -> u64 {
        let page = u64::from(self.page_size.max(1));
        self.bulk_threshold.div_ceil(page)
    }
}
