use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chrome_client::LaunchOptions;
use timeline_archive::{
    ChromeLauncher, Clients, Config, Engine, IdentifierSet, PostId, ScrapeConfig, ScrapeError,
};
use twitter_client::TwitterClient;

#[derive(Parser)]
#[command(
    name = "timeline-scrape",
    about = "Incrementally archive an account's post history to <username>.json"
)]
struct Cli {
    /// Account handle, with or without the leading @
    #[arg(short, long)]
    username: String,

    /// First day to collect (YYYY-MM-DD). Defaults to the account's join date
    #[arg(long, value_parser = parse_day)]
    since: Option<NaiveDate>,

    /// Last day to collect, inclusive (YYYY-MM-DD). Defaults to now
    #[arg(long, value_parser = parse_day)]
    until: Option<NaiveDate>,

    /// Days per search window when crawling large accounts
    #[arg(long, default_value_t = 7)]
    by: u32,

    /// Seconds to wait for the rendered page after each load or scroll
    #[arg(long, default_value_t = 3)]
    delay: u64,

    /// Show the browser window (for manual log-in) and log at debug level
    #[arg(long)]
    debug: bool,

    /// Directory the account document is read from and written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Enrich these comma-separated post ids instead of discovering
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,
}

fn parse_day(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn start_of(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::MIN)
}

fn end_of(day: NaiveDate) -> Option<NaiveDateTime> {
    day.and_hms_opt(23, 59, 59)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["timeline", "twitter_client", "chrome_client"] {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(username = cli.username.as_str(), "timeline-scrape starting");

    let config = Config::from_env()?;
    let client = Arc::new(TwitterClient::new(config.credentials.clone()));
    let clients = Clients {
        account: client.clone(),
        timeline: client,
    };
    let launcher = Arc::new(ChromeLauncher::new(LaunchOptions {
        headless: !cli.debug,
        chrome_bin: config.chrome_bin.as_ref().map(PathBuf::from),
    }));

    let scrape = ScrapeConfig {
        window_days: cli.by.max(1),
        load_delay: Duration::from_secs(cli.delay),
        out_dir: cli.out_dir.clone(),
        ..ScrapeConfig::default()
    };

    let mut engine = Engine::new(&cli.username, clients, launcher, scrape)
        .context("failed to load existing posts")?;

    let outcome = if cli.ids.is_empty() {
        let since = cli.since.map(start_of);
        let until = cli.until.and_then(end_of);
        engine.run(since, until).await
    } else {
        let ids: IdentifierSet = cli
            .ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .filter(|id| {
                let numeric = id.bytes().all(|b| b.is_ascii_digit());
                if !numeric {
                    warn!(id, "skipping id that is not a decimal post id");
                }
                numeric
            })
            .map(PostId::from)
            .collect();
        engine.enrich_identifiers(ids).await
    };

    match outcome {
        Ok(report) => {
            info!(
                handle = engine.handle(),
                strategy = ?report.strategy,
                %report,
                path = %engine.store().path().display(),
                "done"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_access_error() => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
        Err(ScrapeError::InvalidRange { start, end }) => {
            eprintln!("--since ({start}) must not be after --until ({end})");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!(handle = engine.handle(), stage = %engine.stage(), error = %e, "scrape failed");
            Err(e.into())
        }
    }
}
