use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use twitter_client::{Status, User, CREATED_AT_FORMAT};

use crate::error::{Result, ScrapeError};

/// Opaque post identifier, the decimal `id_str` upstream hands out.
///
/// Ordering is numeric for digit strings so that "oldest" is "smallest"
/// without parsing into an integer type that might overflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Numeric ids sort before anything else, so the order stays total
        // when a malformed id slips in.
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => self
                .0
                .len()
                .cmp(&other.0.len())
                .then_with(|| self.0.cmp(&other.0)),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The stored attributes of one post.
///
/// Attributes we don't model are kept verbatim in `extra` so a store written
/// by an older run survives a rewrite untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub created_at: Option<String>,
    pub in_reply_to_status_id: Option<u64>,
    pub full_text: Option<String>,
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PostRecord {
    /// Project a raw upstream status onto the stored attribute set.
    pub fn from_status(status: &Status) -> Self {
        Self {
            created_at: status.created_at.clone(),
            in_reply_to_status_id: status.in_reply_to_status_id,
            full_text: status.full_text.clone(),
            extra: serde_json::Map::new(),
        }
    }
}

pub type PostRecords = BTreeMap<PostId, PostRecord>;
pub type IdentifierSet = BTreeSet<PostId>;

/// The slice of a user profile the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub handle: String,
    pub statuses_count: u64,
    pub protected: bool,
    pub following: bool,
    pub created_at: Option<String>,
}

impl AccountProfile {
    pub fn is_accessible(&self) -> bool {
        !self.protected || self.following
    }

    /// Join date as a naive instant, if upstream reported one.
    pub fn joined_at(&self) -> Option<NaiveDateTime> {
        self.created_at.as_deref().and_then(parse_created_at)
    }
}

impl From<User> for AccountProfile {
    fn from(user: User) -> Self {
        Self {
            handle: user.screen_name,
            statuses_count: user.statuses_count,
            protected: user.protected,
            following: user.following.unwrap_or(false),
            created_at: user.created_at,
        }
    }
}

/// Parse an upstream `created_at` and drop the offset, keeping the wall-clock
/// time it was expressed in.
pub fn parse_created_at(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .ok()
        .map(|dt| dt.naive_local())
}

/// Closed interval `[start, end]` of naive instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(ScrapeError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: &NaiveDateTime) -> bool {
        self.start <= *instant && *instant <= self.end
    }

    /// Number of calendar days touched by the range, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end.date() - self.start.date()).num_days() + 1
    }
}

/// Half-open date interval `[since, until)`, one unit of crawl work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryWindow {
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub width_days: u32,
}

impl DiscoveryWindow {
    /// Slide fixed-width windows across `range`. The last window is clamped
    /// so it never reaches past the day after `range.end`.
    pub fn partition(range: &DateRange, width_days: u32) -> Vec<DiscoveryWindow> {
        let width_days = width_days.max(1);
        let width = Duration::days(i64::from(width_days));
        let limit = range.end.date() + Duration::days(1);

        let mut windows = Vec::new();
        let mut since = range.start.date();
        while since < limit {
            let until = (since + width).min(limit);
            windows.push(DiscoveryWindow {
                since,
                until,
                width_days,
            });
            since = until;
        }
        windows
    }
}

impl fmt::Display for DiscoveryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.since, self.until)
    }
}

/// Which discovery algorithm an account gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Cursor-paginate the timeline endpoint. Small accounts only.
    Bulk,
    /// Crawl rendered search results window by window.
    Windowed,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Bulk => f.write_str("bulk"),
            Strategy::Windowed => f.write_str("windowed"),
        }
    }
}

/// What a discovery run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Discovery {
    /// Bulk mode already carries projected records.
    Records(PostRecords),
    /// Windowed mode only knows identifiers; they still need enrichment.
    Identifiers(IdentifierSet),
}

impl Discovery {
    pub fn len(&self) -> usize {
        match self {
            Discovery::Records(records) => records.len(),
            Discovery::Identifiers(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
