use serde::{Deserialize, Serialize};

/// Timestamp format used by every v1.1 `created_at` field,
/// e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// A user object from `users/show.json`. Only the fields we act on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id_str: String,
    pub screen_name: String,
    #[serde(default)]
    pub statuses_count: u64,
    #[serde(default)]
    pub protected: bool,
    /// Whether the authenticating account follows this user. The API sends
    /// `null` when there is no relationship to report.
    #[serde(default)]
    pub following: Option<bool>,
    pub created_at: Option<String>,
}

/// A status (tweet) object, requested with `tweet_mode=extended`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    pub id_str: String,
    pub created_at: Option<String>,
    pub full_text: Option<String>,
    pub in_reply_to_status_id: Option<u64>,
    /// Present only on retweets. Kept opaque; we only test for its presence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_status: Option<serde_json::Value>,
}

impl Status {
    pub fn is_retweet(&self) -> bool {
        self.retweeted_status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_without_retweet_field_is_original() {
        let status: Status = serde_json::from_str(
            r#"{
                "id_str": "1081402741778456577",
                "created_at": "Sat Jan 05 04:51:06 +0000 2019",
                "full_text": "hello",
                "in_reply_to_status_id": null
            }"#,
        )
        .unwrap();

        assert!(!status.is_retweet());
        assert_eq!(status.in_reply_to_status_id, None);
    }

    #[test]
    fn status_with_retweet_field_is_retweet() {
        let status: Status = serde_json::from_str(
            r#"{
                "id_str": "2",
                "created_at": "Sat Jan 05 04:51:06 +0000 2019",
                "full_text": "RT @someone: hi",
                "in_reply_to_status_id": null,
                "retweeted_status": {"id_str": "1"}
            }"#,
        )
        .unwrap();

        assert!(status.is_retweet());
    }

    #[test]
    fn followed_protected_user_keeps_relationship() {
        let user: User = serde_json::from_str(
            r#"{"id_str": "9", "screen_name": "a", "statuses_count": 10,
                "protected": true, "following": true, "created_at": null}"#,
        )
        .unwrap();
        assert!(user.protected);
        assert_eq!(user.following, Some(true));
    }

    #[test]
    fn null_following_and_missing_counts_deserialize() {
        let user: User = serde_json::from_str(
            r#"{"id_str": "9", "screen_name": "a", "following": null, "created_at": null}"#,
        )
        .unwrap();
        assert_eq!(user.following, None);
        assert_eq!(user.statuses_count, 0);
        assert!(!user.protected);
    }
}
