// Acquisition engine: load -> check access -> discover -> dedup -> enrich -> persist.
//
// The engine owns the account store for the whole run. Discovery components
// only ever see the API capabilities and the rendering session; they hand
// back identifiers or records and the engine decides what is new.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::batch::{BatchFetcher, PartialFetch};
use crate::config::ScrapeConfig;
use crate::dedup;
use crate::discovery::{
    check_access, select_strategy, BulkCursor, CrawlSettings, Discoverer, WindowedCrawl,
};
use crate::error::{Result, ScrapeError};
use crate::store::AccountStore;
use crate::traits::{AccountApi, SessionLauncher, TimelineApi};
use crate::types::{AccountProfile, DateRange, Discovery, IdentifierSet, PostRecords, Strategy};

/// Where a run currently is. `Failed` is terminal and reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    CheckAccess,
    Discover,
    Deduplicate,
    Enrich,
    Persist,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::CheckAccess => "CHECK_ACCESS",
            Stage::Discover => "DISCOVER",
            Stage::Deduplicate => "DEDUPLICATE",
            Stage::Enrich => "ENRICH",
            Stage::Persist => "PERSIST",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// The two API capabilities, built once and shared by the discovery
/// components that need them.
#[derive(Clone)]
pub struct Clients {
    pub account: Arc<dyn AccountApi>,
    pub timeline: Arc<dyn TimelineApi>,
}

/// Counts from one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub strategy: Option<Strategy>,
    pub existing: usize,
    pub discovered: usize,
    pub new: usize,
    pub enriched: usize,
    pub stored: usize,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "existing={} discovered={} new={} enriched={} stored={}",
            self.existing, self.discovered, self.new, self.enriched, self.stored
        )
    }
}

pub struct Engine {
    handle: String,
    clients: Clients,
    launcher: Arc<dyn SessionLauncher>,
    config: ScrapeConfig,
    store: AccountStore,
    stage: Stage,
}

impl Engine {
    /// INIT: load whatever was stored for this account by earlier runs.
    pub fn new(
        handle: &str,
        clients: Clients,
        launcher: Arc<dyn SessionLauncher>,
        config: ScrapeConfig,
    ) -> Result<Self> {
        let handle = handle.trim_start_matches('@').to_lowercase();
        let store = AccountStore::load(AccountStore::path_for(&config.out_dir, &handle))?;
        info!(
            handle = handle.as_str(),
            existing = store.len(),
            path = %store.path().display(),
            stage = %Stage::Init,
            "existing posts loaded"
        );

        Ok(Self {
            handle,
            clients,
            launcher,
            config,
            store,
            stage: Stage::Init,
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    /// Profile lookup, mapped through the access check.
    pub async fn accessible_profile(&self) -> Result<AccountProfile> {
        let profile = self.clients.account.profile(&self.handle).await?;
        check_access(&profile)?;
        Ok(profile)
    }

    /// Full scrape-then-enrich run. `since` defaults to the account's join
    /// date, `until` to now.
    pub async fn run(
        &mut self,
        since: Option<NaiveDateTime>,
        until: Option<NaiveDateTime>,
    ) -> Result<RunReport> {
        let result = self.run_stages(since, until).await;
        if let Err(ref e) = result {
            warn!(handle = self.handle.as_str(), failed_in = %self.stage, error = %e, "run failed");
            self.enter(Stage::Failed);
        }
        result
    }

    /// Enrich an explicit identifier list, skipping access checks and
    /// discovery. Known identifiers are not looked up again.
    pub async fn enrich_identifiers(&mut self, ids: IdentifierSet) -> Result<RunReport> {
        let result = self.enrich_stages(ids).await;
        if let Err(ref e) = result {
            warn!(handle = self.handle.as_str(), failed_in = %self.stage, error = %e, "enrichment failed");
            self.enter(Stage::Failed);
        }
        result
    }

    async fn run_stages(
        &mut self,
        since: Option<NaiveDateTime>,
        until: Option<NaiveDateTime>,
    ) -> Result<RunReport> {
        let existing = self.store.len();
        if let (Some(start), Some(end)) = (since, until) {
            DateRange::new(start, end)?;
        }

        self.enter(Stage::CheckAccess);
        let profile = self.accessible_profile().await?;
        let range = resolve_range(&profile, since, until)?;

        self.enter(Stage::Discover);
        let strategy = select_strategy(&profile, self.config.bulk_threshold);
        info!(
            handle = self.handle.as_str(),
            posts = profile.statuses_count,
            threshold = self.config.bulk_threshold,
            strategy = %strategy,
            start = %range.start,
            end = %range.end,
            "searching for posts"
        );
        let discovery = {
            let discoverer = self.discoverer(strategy, profile.statuses_count);
            discoverer.discover(&range).await?
        };
        let discovered = discovery.len();

        self.enter(Stage::Deduplicate);
        let (new, fresh) = match discovery {
            Discovery::Records(records) => {
                let fresh = dedup::new_records(records, &self.store);
                info!(new = fresh.len(), "found new posts");
                (fresh.len(), fresh)
            }
            Discovery::Identifiers(ids) => {
                let new_ids = dedup::new_identifiers(&ids, &self.store);
                info!(new = new_ids.len(), "found new posts");

                self.enter(Stage::Enrich);
                (new_ids.len(), self.enrich(&new_ids).await?)
            }
        };
        let enriched = if strategy == Strategy::Windowed {
            fresh.len()
        } else {
            0
        };

        self.persist(fresh)?;

        Ok(RunReport {
            strategy: Some(strategy),
            existing,
            discovered,
            new,
            enriched,
            stored: self.store.len(),
        })
    }

    async fn enrich_stages(&mut self, ids: IdentifierSet) -> Result<RunReport> {
        let existing = self.store.len();
        let discovered = ids.len();

        self.enter(Stage::Deduplicate);
        let new_ids = dedup::new_identifiers(&ids, &self.store);
        info!(requested = discovered, new = new_ids.len(), "found new posts");

        self.enter(Stage::Enrich);
        let fresh = self.enrich(&new_ids).await?;
        let enriched = fresh.len();

        self.persist(fresh)?;

        Ok(RunReport {
            strategy: None,
            existing,
            discovered,
            new: new_ids.len(),
            enriched,
            stored: self.store.len(),
        })
    }

    fn discoverer(&self, strategy: Strategy, expected: u64) -> Discoverer<'_> {
        match strategy {
            Strategy::Bulk => Discoverer::Bulk(BulkCursor::new(
                self.clients.timeline.as_ref(),
                &self.handle,
                self.config.page_size,
                self.config.max_pages(),
                expected,
            )),
            Strategy::Windowed => Discoverer::Windowed {
                crawl: WindowedCrawl::new(
                    &self.handle,
                    CrawlSettings {
                        window_days: self.config.window_days,
                        load_delay: self.config.load_delay,
                        login_wait: self.config.login_wait,
                        max_scrolls: self.config.max_scrolls,
                        search_url: self.config.search_url.clone(),
                    },
                ),
                launcher: self.launcher.as_ref(),
            },
        }
    }

    /// Batch-fetch `ids`. If a batch fails, whatever completed is stored
    /// before the error is returned.
    async fn enrich(&mut self, ids: &IdentifierSet) -> Result<PostRecords> {
        let fetched = BatchFetcher::new(
            self.clients.account.as_ref(),
            self.config.batch_size,
            self.config.api_delay,
        )
        .fetch(ids)
        .await;

        match fetched {
            Ok(records) => Ok(records),
            Err(PartialFetch { fetched, error }) => {
                let saved = self.store.merge(fetched);
                if saved > 0 {
                    self.store.persist()?;
                    warn!(saved, "stored completed batches before failing");
                }
                Err(error)
            }
        }
    }

    fn persist(&mut self, fresh: PostRecords) -> Result<()> {
        self.enter(Stage::Persist);
        let added = self.store.merge(fresh);
        self.store.persist()?;
        info!(
            handle = self.handle.as_str(),
            added,
            stored = self.store.len(),
            path = %self.store.path().display(),
            "finished scraping"
        );
        self.enter(Stage::Done);
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }
}

fn resolve_range(
    profile: &AccountProfile,
    since: Option<NaiveDateTime>,
    until: Option<NaiveDateTime>,
) -> Result<DateRange> {
    let start = match since.or_else(|| profile.joined_at()) {
        Some(start) => start,
        None => {
            return Err(ScrapeError::Other(anyhow::anyhow!(
                "no start date given and @{} has no join date",
                profile.handle
            )))
        }
    };
    let end = until.unwrap_or_else(|| Utc::now().naive_utc());
    DateRange::new(start, end)
}
