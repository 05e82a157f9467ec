pub mod error;
pub mod oauth;
pub mod types;

pub use error::{Result, TwitterError};
pub use oauth::Credentials;
pub use types::{Status, User, CREATED_AT_FORMAT};

use std::time::Duration;

use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.twitter.com/1.1";

/// `statuses/lookup` accepts at most this many ids per call.
pub const LOOKUP_LIMIT: usize = 100;

/// `statuses/user_timeline` returns at most this many statuses per call.
pub const TIMELINE_PAGE_LIMIT: u32 = 200;

pub struct TwitterClient {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl TwitterClient {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, BASE_URL)
    }

    /// Point the client at a different API root (proxies, local fakes).
    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Look up a user profile by screen name.
    pub async fn get_user(&self, screen_name: &str) -> Result<User> {
        tracing::debug!(screen_name, "twitter: users/show");
        self.get_json("users/show.json", &[("screen_name", screen_name)])
            .await
    }

    /// One page of a user's timeline, newest first. `max_id` is inclusive.
    pub async fn user_timeline(
        &self,
        screen_name: &str,
        count: u32,
        max_id: Option<&str>,
    ) -> Result<Vec<Status>> {
        let count = count.min(TIMELINE_PAGE_LIMIT).to_string();
        let mut query = vec![
            ("screen_name", screen_name),
            ("count", count.as_str()),
            ("tweet_mode", "extended"),
        ];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id));
        }

        tracing::debug!(screen_name, max_id, "twitter: statuses/user_timeline");
        self.get_json("statuses/user_timeline.json", &query).await
    }

    /// Fetch full statuses for up to [`LOOKUP_LIMIT`] ids. Ids that no longer
    /// exist are simply absent from the result.
    pub async fn lookup_statuses(&self, ids: &[&str]) -> Result<Vec<Status>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > LOOKUP_LIMIT {
            return Err(TwitterError::Api {
                status: 400,
                message: format!("lookup accepts at most {LOOKUP_LIMIT} ids, got {}", ids.len()),
            });
        }

        let joined = ids.join(",");
        tracing::debug!(count = ids.len(), "twitter: statuses/lookup");
        self.get_json(
            "statuses/lookup.json",
            &[("id", joined.as_str()), ("tweet_mode", "extended")],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let auth = oauth::authorization_header(&self.credentials, "GET", &url, query, &nonce, timestamp);

        let resp = self
            .client
            .get(&url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(TwitterError::NotFound(format!("{path}: {body}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
