// Bulk cursor discovery: walk the timeline endpoint backwards by oldest-seen id.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use twitter_client::Status;

use crate::error::Result;
use crate::traits::TimelineApi;
use crate::types::{parse_created_at, DateRange, PostId, PostRecord, PostRecords};

pub struct BulkCursor<'a> {
    timeline: &'a dyn TimelineApi,
    handle: &'a str,
    page_size: u32,
    max_pages: u64,
    expected: u64,
}

impl<'a> BulkCursor<'a> {
    /// `expected` is the profile's post count; paging stops once that many
    /// records have been collected.
    pub fn new(
        timeline: &'a dyn TimelineApi,
        handle: &'a str,
        page_size: u32,
        max_pages: u64,
        expected: u64,
    ) -> Self {
        Self {
            timeline,
            handle,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            expected,
        }
    }

    /// Every original post in `range`, projected to stored attributes.
    pub async fn discover(&self, range: &DateRange) -> Result<PostRecords> {
        let raw = self.retrieve_payload().await?;
        let fetched = raw.len();
        let records = filter_posts(raw, range);
        info!(
            handle = self.handle,
            fetched,
            kept = records.len(),
            "bulk discovery filtered to range"
        );
        Ok(records)
    }

    /// Page through the timeline. Stops at the page budget, on an empty page,
    /// when a page brings nothing new, or once every expected post is in hand.
    ///
    /// Upstream applies `count` before dropping deleted or withheld posts, so
    /// a short page says nothing about whether older history remains.
    async fn retrieve_payload(&self) -> Result<BTreeMap<PostId, Status>> {
        let mut all = BTreeMap::new();
        let mut cursor: Option<PostId> = None;

        for page_no in 1..=self.max_pages {
            let page = self
                .timeline
                .timeline_page(self.handle, self.page_size, cursor.as_ref())
                .await?;
            let page_len = page.len();

            // Newest-first, so the last record is the oldest.
            let oldest = page.last().map(|s| PostId::new(s.id_str.clone()));

            let mut added = 0usize;
            for status in page {
                let id = PostId::new(status.id_str.clone());
                if !all.contains_key(&id) {
                    all.insert(id, status);
                    added += 1;
                }
            }
            debug!(page = page_no, size = page_len, added, "timeline page");

            if page_len == 0 || added == 0 {
                break;
            }
            if all.len() as u64 >= self.expected {
                debug!(collected = all.len(), expected = self.expected, "all posts collected");
                break;
            }
            cursor = oldest;
        }

        Ok(all)
    }
}

/// Keep posts created inside `range` that are not reshares.
pub(crate) fn filter_posts(raw: BTreeMap<PostId, Status>, range: &DateRange) -> PostRecords {
    raw.into_iter()
        .filter(|(id, status)| {
            if status.is_retweet() {
                return false;
            }
            match status.created_at.as_deref().and_then(parse_created_at) {
                Some(created) => range.contains(&created),
                None => {
                    warn!(id = %id, created_at = ?status.created_at, "unparseable timestamp, dropping post");
                    false
                }
            }
        })
        .map(|(id, status)| {
            let record = PostRecord::from_status(&status);
            (id, record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{retweet, status, MockTimeline, MID_JANUARY_2020};
    use chrono::NaiveDate;

    fn january_2020() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 31).unwrap().and_hms_opt(23, 59, 59).unwrap(),
        )
        .unwrap()
    }

    fn posts(ids: std::ops::RangeInclusive<u64>) -> Vec<Status> {
        ids.map(|n| status(&n.to_string(), MID_JANUARY_2020, "hi"))
            .collect()
    }

    #[tokio::test]
    async fn small_account_needs_one_page() {
        let timeline = MockTimeline::new(posts(1..=50));
        let cursor = BulkCursor::new(&timeline, "someone", 200, 16, 50);

        let records = cursor.discover(&january_2020()).await.unwrap();

        assert_eq!(records.len(), 50);
        assert_eq!(timeline.page_calls(), vec![None]);
    }

    #[tokio::test]
    async fn cursor_is_oldest_id_of_previous_page() {
        let timeline = MockTimeline::new(posts(1..=5));
        let cursor = BulkCursor::new(&timeline, "someone", 2, 16, 5);

        let records = cursor.discover(&january_2020()).await.unwrap();

        assert_eq!(records.len(), 5);
        // Pages: [5,4] -> cursor 4 -> [4,3] -> cursor 3 -> [3,2] -> cursor 2 -> [2,1], all 5 seen
        assert_eq!(
            timeline.page_calls(),
            vec![
                None,
                Some(PostId::from("4")),
                Some(PostId::from("3")),
                Some(PostId::from("2")),
            ]
        );
    }

    #[tokio::test]
    async fn short_pages_do_not_end_pagination() {
        // Every hundredth post is gone upstream but still counts against
        // `count`, so each page comes back two or so short.
        let deleted = (1..=10).map(|n| (n * 100).to_string());
        let timeline = MockTimeline::new(posts(1..=1000)).with_deleted(deleted);
        let cursor = BulkCursor::new(&timeline, "someone", 200, 16, 990);

        let records = cursor.discover(&january_2020()).await.unwrap();

        assert_eq!(records.len(), 990);
        assert!(timeline.page_calls().len() > 1);
        assert!(timeline.page_calls().len() <= 16);
    }

    #[tokio::test]
    async fn stale_post_count_stops_when_a_page_adds_nothing() {
        let timeline = MockTimeline::new(posts(1..=5));
        let cursor = BulkCursor::new(&timeline, "someone", 2, 16, 50);

        let records = cursor.discover(&january_2020()).await.unwrap();

        assert_eq!(records.len(), 5);
        // [5,4] [4,3] [3,2] [2,1] [1] -> the last page adds nothing
        assert_eq!(timeline.page_calls().len(), 5);
    }

    #[tokio::test]
    async fn empty_timeline_makes_one_call() {
        let timeline = MockTimeline::new(Vec::new());
        let cursor = BulkCursor::new(&timeline, "someone", 200, 16, 10);

        assert!(cursor.discover(&january_2020()).await.unwrap().is_empty());
        assert_eq!(timeline.page_calls().len(), 1);
    }

    #[tokio::test]
    async fn page_budget_bounds_requests() {
        let timeline = MockTimeline::new(posts(1..=100));
        let cursor = BulkCursor::new(&timeline, "someone", 10, 3, 100);

        cursor.discover(&january_2020()).await.unwrap();

        assert_eq!(timeline.page_calls().len(), 3);
    }

    #[tokio::test]
    async fn filters_out_of_range_and_reshares() {
        let timeline = MockTimeline::new(vec![
            status("4", "Sat Feb 01 00:00:01 +0000 2020", "too late"),
            retweet("3", MID_JANUARY_2020),
            status("2", MID_JANUARY_2020, "keep"),
            status("1", "Tue Dec 31 23:59:59 +0000 2019", "too early"),
        ]);
        let cursor = BulkCursor::new(&timeline, "someone", 200, 16, 4);

        let records = cursor.discover(&january_2020()).await.unwrap();

        assert_eq!(records.keys().cloned().collect::<Vec<_>>(), vec![PostId::from("2")]);
        assert_eq!(records[&PostId::from("2")].full_text.as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn range_bounds_are_inclusive() {
        let timeline = MockTimeline::new(vec![
            status("2", "Fri Jan 31 23:59:59 +0000 2020", "end"),
            status("1", "Wed Jan 01 00:00:00 +0000 2020", "start"),
        ]);
        let cursor = BulkCursor::new(&timeline, "someone", 200, 16, 2);

        let records = cursor.discover(&january_2020()).await.unwrap();

        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_timestamp_is_dropped() {
        let timeline = MockTimeline::new(vec![status("1", "yesterday", "?")]);
        let cursor = BulkCursor::new(&timeline, "someone", 200, 16, 1);

        assert!(cursor.discover(&january_2020()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let timeline = MockTimeline::new(Vec::new()).fail_on_call(1);
        let cursor = BulkCursor::new(&timeline, "someone", 200, 16, 1);

        assert!(cursor.discover(&january_2020()).await.is_err());
    }
}
