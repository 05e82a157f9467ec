pub mod bulk;
pub mod windowed;

pub use bulk::BulkCursor;
pub use windowed::{CrawlSettings, WindowedCrawl};

use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::traits::SessionLauncher;
use crate::types::{AccountProfile, DateRange, Discovery, Strategy};

/// Fail unless the acquiring account can read this profile's posts.
pub fn check_access(profile: &AccountProfile) -> Result<()> {
    if !profile.is_accessible() {
        return Err(ScrapeError::AccountPrivate(profile.handle.clone()));
    }
    Ok(())
}

/// Small accounts fit inside the timeline endpoint's history depth; anything
/// larger has to be crawled.
pub fn select_strategy(profile: &AccountProfile, threshold: u64) -> Strategy {
    if profile.statuses_count <= threshold {
        Strategy::Bulk
    } else {
        Strategy::Windowed
    }
}

/// The chosen discovery algorithm, ready to run.
pub enum Discoverer<'a> {
    Bulk(BulkCursor<'a>),
    Windowed {
        crawl: WindowedCrawl<'a>,
        launcher: &'a dyn SessionLauncher,
    },
}

impl Discoverer<'_> {
    pub async fn discover(&self, range: &DateRange) -> Result<Discovery> {
        match self {
            Discoverer::Bulk(cursor) => Ok(Discovery::Records(cursor.discover(range).await?)),
            Discoverer::Windowed { crawl, launcher } => {
                let mut session = launcher.launch().await?;
                let crawled = crawl.discover(session.as_mut(), range).await;
                if let Err(e) = session.close().await {
                    warn!(error = %e, crawl_failed = crawled.is_err(), "failed to close rendering session");
                }

                let ids = crawled?;
                info!(discovered = ids.len(), "windowed crawl finished");
                Ok(Discovery::Identifiers(ids))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(count: u64, protected: bool, following: bool) -> AccountProfile {
        AccountProfile {
            handle: "someone".to_string(),
            statuses_count: count,
            protected,
            following,
            created_at: None,
        }
    }

    #[test]
    fn threshold_is_inclusive_for_bulk() {
        assert_eq!(select_strategy(&profile(3200, false, false), 3200), Strategy::Bulk);
        assert_eq!(select_strategy(&profile(50, false, false), 3200), Strategy::Bulk);
        assert_eq!(select_strategy(&profile(3201, false, false), 3200), Strategy::Windowed);
    }

    #[test]
    fn private_unfollowed_account_is_rejected() {
        let err = check_access(&profile(10, true, false)).unwrap_err();
        assert!(matches!(err, ScrapeError::AccountPrivate(ref h) if h == "someone"));
    }

    #[test]
    fn private_followed_and_public_accounts_pass() {
        assert!(check_access(&profile(10, true, true)).is_ok());
        assert!(check_access(&profile(10, false, false)).is_ok());
    }
}
