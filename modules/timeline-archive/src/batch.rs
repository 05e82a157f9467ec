// Rate-limited enrichment: identifiers in, projected records out.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::traits::AccountApi;
use crate::types::{IdentifierSet, PostId, PostRecord, PostRecords};

/// A lookup failed partway. `fetched` holds every record from the batches
/// that completed before `error`.
#[derive(Debug)]
pub struct PartialFetch {
    pub fetched: PostRecords,
    pub error: ScrapeError,
}

pub struct BatchFetcher<'a> {
    api: &'a dyn AccountApi,
    batch_size: usize,
    delay: Duration,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(api: &'a dyn AccountApi, batch_size: usize, delay: Duration) -> Self {
        Self {
            api,
            batch_size: batch_size.max(1),
            delay,
        }
    }

    /// Rough wall-clock cost of enriching `count` identifiers.
    pub fn estimate(&self, count: usize) -> Duration {
        self.delay * count.div_ceil(self.batch_size) as u32
    }

    /// Look up every identifier, one batch at a time, pausing between batches.
    pub async fn fetch(&self, ids: &IdentifierSet) -> Result<PostRecords, PartialFetch> {
        let mut fetched = PostRecords::new();
        if ids.is_empty() {
            return Ok(fetched);
        }

        let ids: Vec<PostId> = ids.iter().cloned().collect();
        let batches: Vec<&[PostId]> = ids.chunks(self.batch_size).collect();
        let total = batches.len();

        info!(
            count = ids.len(),
            batches = total,
            estimated_secs = self.estimate(ids.len()).as_secs(),
            "retrieving post metadata"
        );

        for (i, batch) in batches.into_iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            info!(batch = i + 1, of = total, size = batch.len(), "lookup batch");
            let statuses = match self.api.lookup(batch).await {
                Ok(statuses) => statuses,
                Err(error) => {
                    warn!(batch = i + 1, of = total, error = %error, "lookup batch failed");
                    return Err(PartialFetch { fetched, error });
                }
            };

            let missing = batch.len().saturating_sub(statuses.len());
            if missing > 0 {
                info!(batch = i + 1, missing, "some posts no longer exist");
            }

            for status in &statuses {
                fetched
                    .entry(PostId::new(status.id_str.clone()))
                    .or_insert_with(|| PostRecord::from_status(status));
            }
        }

        Ok(fetched)
    }
}
