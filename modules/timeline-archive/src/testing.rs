// Test mocks for the acquisition engine.
//
// One mock per trait boundary:
// - MockAccountApi (AccountApi): fixed profile + id→status table
// - MockTimeline (TimelineApi): newest-first status list with max_id cursor
// - ScriptedSurface / ScriptedLauncher (RenderSurface / SessionLauncher):
//   a queue of scripted page landings, one per navigation
//
// Plus helpers for building statuses, profiles and a zero-delay config.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrome_client::BrowserError;
use twitter_client::{Status, TwitterError};

use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};
use crate::traits::{AccountApi, RenderSurface, SessionLauncher, TimelineApi};
use crate::types::{AccountProfile, PostId};

/// Created-at used for statuses when the test doesn't care.
pub const MID_JANUARY_2020: &str = "Wed Jan 15 12:00:00 +0000 2020";

/// Search page location used by scripted landings.
const SEARCH_LOCATION: &str = "https://twitter.com/search";
const LOGIN_LOCATION: &str = "https://twitter.com/i/flow/login?redirect_after_login=%2Fsearch";

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn status(id: &str, created_at: &str, text: &str) -> Status {
    Status {
        id_str: id.to_string(),
        created_at: Some(created_at.to_string()),
        full_text: Some(text.to_string()),
        in_reply_to_status_id: None,
        retweeted_status: None,
    }
}

pub fn retweet(id: &str, created_at: &str) -> Status {
    Status {
        retweeted_status: Some(serde_json::json!({ "id_str": "1" })),
        ..status(id, created_at, "RT @someone: shared")
    }
}

/// A public account that joined at the start of 2020.
pub fn profile(handle: &str, statuses_count: u64) -> AccountProfile {
    AccountProfile {
        handle: handle.to_string(),
        statuses_count,
        protected: false,
        following: false,
        created_at: Some("Wed Jan 01 00:00:00 +0000 2020".to_string()),
    }
}

/// Default tunables with every pause removed and the store under `out_dir`.
pub fn immediate_config(out_dir: &Path) -> ScrapeConfig {
    ScrapeConfig {
        api_delay: Duration::ZERO,
        load_delay: Duration::ZERO,
        login_wait: Duration::ZERO,
        out_dir: out_dir.to_path_buf(),
        ..ScrapeConfig::default()
    }
}

fn upstream_failure(call: usize) -> ScrapeError {
    ScrapeError::Api(TwitterError::Api {
        status: 503,
        message: format!("mock failure on call {call}"),
    })
}

// ---------------------------------------------------------------------------
// MockAccountApi
// ---------------------------------------------------------------------------

/// Profile lookup returns the configured profile, or `AccountNotFound` when
/// none is set. Lookup returns whichever requested ids are in the table.
pub struct MockAccountApi {
    profile: Option<AccountProfile>,
    statuses: HashMap<PostId, Status>,
    fail_lookup_on: Option<usize>,
    profile_calls: Mutex<Vec<String>>,
    lookup_calls: Mutex<Vec<Vec<PostId>>>,
}

impl MockAccountApi {
    pub fn new() -> Self {
        Self {
            profile: None,
            statuses: HashMap::new(),
            fail_lookup_on: None,
            profile_calls: Mutex::new(Vec::new()),
            lookup_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profile(mut self, profile: AccountProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// One mid-January 2020 status per id.
    pub fn with_statuses<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            self.statuses.insert(
                PostId::from(id),
                status(id, MID_JANUARY_2020, &format!("post {id}")),
            );
        }
        self
    }

    /// The `n`th lookup call (1-based) fails. The call is still recorded.
    pub fn fail_lookup_on_call(mut self, n: usize) -> Self {
        self.fail_lookup_on = Some(n);
        self
    }

    pub fn lookup_calls(&self) -> Vec<Vec<PostId>> {
        self.lookup_calls.lock().unwrap().clone()
    }

    pub fn profile_calls(&self) -> Vec<String> {
        self.profile_calls.lock().unwrap().clone()
    }
}

impl Default for MockAccountApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountApi for MockAccountApi {
    async fn profile(&self, handle: &str) -> Result<AccountProfile> {
        self.profile_calls.lock().unwrap().push(handle.to_string());
        self.profile
            .clone()
            .ok_or_else(|| ScrapeError::AccountNotFound(handle.to_string()))
    }

    async fn lookup(&self, ids: &[PostId]) -> Result<Vec<Status>> {
        let call = {
            let mut calls = self.lookup_calls.lock().unwrap();
            calls.push(ids.to_vec());
            calls.len()
        };
        if self.fail_lookup_on == Some(call) {
            return Err(upstream_failure(call));
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.statuses.get(id).cloned())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockTimeline
// ---------------------------------------------------------------------------

/// Serves `statuses` newest-first. `max_id` is inclusive, as upstream.
pub struct MockTimeline {
    statuses: Vec<Status>,
    deleted: HashSet<PostId>,
    fail_on: Option<usize>,
    page_calls: Mutex<Vec<Option<PostId>>>,
}

impl MockTimeline {
    pub fn new(mut statuses: Vec<Status>) -> Self {
        statuses.sort_by(|a, b| PostId::from(b.id_str.as_str()).cmp(&PostId::from(a.id_str.as_str())));
        Self {
            statuses,
            deleted: HashSet::new(),
            fail_on: None,
            page_calls: Mutex::new(Vec::new()),
        }
    }

    /// Posts that still occupy a slot of `count` but are stripped from the
    /// page, the way upstream drops deleted and withheld posts.
    pub fn with_deleted<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.deleted
            .extend(ids.into_iter().map(|id| PostId::from(id.as_ref())));
        self
    }

    /// The `n`th page request (1-based) fails.
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// The `max_id` of every page request, in order.
    pub fn page_calls(&self) -> Vec<Option<PostId>> {
        self.page_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimelineApi for MockTimeline {
    async fn timeline_page(
        &self,
        _handle: &str,
        count: u32,
        max_id: Option<&PostId>,
    ) -> Result<Vec<Status>> {
        let call = {
            let mut calls = self.page_calls.lock().unwrap();
            calls.push(max_id.cloned());
            calls.len()
        };
        if self.fail_on == Some(call) {
            return Err(upstream_failure(call));
        }
        Ok(self
            .statuses
            .iter()
            .filter(|s| max_id.is_none_or(|max| &PostId::from(s.id_str.as_str()) <= max))
            .take(count as usize)
            .filter(|s| !self.deleted.contains(&PostId::from(s.id_str.as_str())))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// ScriptedSurface / ScriptedLauncher
// ---------------------------------------------------------------------------

/// One rendered post, a post that unloads while being read, or a read the
/// browser rejects outright.
#[derive(Debug, Clone)]
pub enum Fragment {
    Html(String),
    Stale,
    Unreadable,
}

impl Fragment {
    /// A post card linking to `/<handle>/status/<id>`.
    pub fn post(handle: &str, id: &str) -> Self {
        Fragment::Html(format!(
            r#"<div><a href="/{handle}/status/{id}"><time>now</time></a><span>text</span></div>"#
        ))
    }
}

/// What a single navigation lands on. `states[i]` is the page after `i`
/// scrolls; scrolling past the last state keeps showing it.
#[derive(Debug, Clone)]
pub struct Landing {
    location: String,
    states: Vec<Vec<Fragment>>,
    broken: bool,
}

impl Landing {
    pub fn new(states: Vec<Vec<Fragment>>) -> Self {
        Self {
            location: SEARCH_LOCATION.to_string(),
            states,
            broken: false,
        }
    }

    /// Shorthand for a page whose scroll states are lists of post ids.
    pub fn posts(handle: &str, states: &[&[&str]]) -> Self {
        Self::new(
            states
                .iter()
                .map(|ids| ids.iter().map(|id| Fragment::post(handle, id)).collect())
                .collect(),
        )
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Redirected to the log-in flow, nothing rendered.
    pub fn login_wall() -> Self {
        Self {
            location: LOGIN_LOCATION.to_string(),
            ..Self::empty()
        }
    }

    /// Loads, but reading posts fails with a protocol error.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::empty()
        }
    }

    fn fragments(&self, scrolls: usize) -> Vec<Fragment> {
        if self.states.is_empty() {
            return Vec::new();
        }
        self.states[scrolls.min(self.states.len() - 1)].clone()
    }
}

/// Everything a scripted session saw.
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog {
    pub launches: usize,
    pub navigations: Vec<String>,
    pub scrolls: usize,
    pub closed: usize,
}

pub struct ScriptedSurface {
    script: VecDeque<Landing>,
    current: Option<Landing>,
    scrolls: usize,
    fail_close: bool,
    log: Arc<Mutex<SurfaceLog>>,
}

impl ScriptedSurface {
    /// Each navigation takes the next landing. Once the script runs out,
    /// navigation lands on an empty search page.
    pub fn new(script: Vec<Landing>) -> Self {
        Self::with_log(script, Arc::new(Mutex::new(SurfaceLog::default())))
    }

    fn with_log(script: Vec<Landing>, log: Arc<Mutex<SurfaceLog>>) -> Self {
        Self {
            script: script.into(),
            current: None,
            scrolls: 0,
            fail_close: false,
            log,
        }
    }

    pub fn log(&self) -> SurfaceLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderSurface for ScriptedSurface {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        self.current = Some(self.script.pop_front().unwrap_or_else(Landing::empty));
        self.scrolls = 0;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Option<String>> {
        Ok(self.current.as_ref().map(|l| l.location.clone()))
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.log.lock().unwrap().scrolls += 1;
        self.scrolls += 1;
        Ok(())
    }

    async fn post_fragments(&mut self) -> Result<Vec<Result<String>>> {
        let Some(landing) = &self.current else {
            return Ok(Vec::new());
        };
        if landing.broken {
            return Err(BrowserError::Protocol("scripted read failure".to_string()).into());
        }
        Ok(landing
            .fragments(self.scrolls)
            .into_iter()
            .map(|f| match f {
                Fragment::Html(html) => Ok(html),
                Fragment::Stale => Err(ScrapeError::StaleElement),
                Fragment::Unreadable => {
                    Err(BrowserError::Protocol("scripted element read failure".to_string()).into())
                }
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.lock().unwrap().closed += 1;
        if self.fail_close {
            return Err(BrowserError::Protocol("scripted close failure".to_string()).into());
        }
        Ok(())
    }
}

/// Hands the whole script to the first session it launches.
pub struct ScriptedLauncher {
    script: Mutex<Vec<Landing>>,
    fail_launch: bool,
    fail_close: bool,
    log: Arc<Mutex<SurfaceLog>>,
}

impl ScriptedLauncher {
    pub fn new(script: Vec<Landing>) -> Self {
        Self {
            script: Mutex::new(script),
            fail_launch: false,
            fail_close: false,
            log: Arc::new(Mutex::new(SurfaceLog::default())),
        }
    }

    /// A launcher whose browser never starts.
    pub fn unavailable() -> Self {
        Self {
            fail_launch: true,
            ..Self::new(Vec::new())
        }
    }

    /// Sessions from this launcher fail to shut down cleanly.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn log(&self) -> SurfaceLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSurface>> {
        self.log.lock().unwrap().launches += 1;
        if self.fail_launch {
            return Err(BrowserError::Launch("scripted launch failure".to_string()).into());
        }
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        let mut surface = ScriptedSurface::with_log(script, self.log.clone());
        surface.fail_close = self.fail_close;
        Ok(Box::new(surface))
    }
}
