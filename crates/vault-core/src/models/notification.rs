use serde::{Deserialize, Serialize};

/// A system notification as captured by the listener and persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedNotification {
    /// Store-assigned identity, ascending and never reused
    pub id: i64,
    /// Human-readable name of the posting app (falls back to `app_id`)
    pub app_name: String,
    /// Package identifier of the posting app
    pub app_id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    /// Epoch milliseconds at which the system posted the notification
    pub post_time_millis: i64,
    /// Local-time rendering of `post_time_millis` computed at capture
    pub post_time_display: String,
    /// Correlation key issued by the notification system for this post
    pub key: String,
    pub is_dismissed: bool,
    /// Set iff `is_dismissed`; never earlier than `post_time_millis`
    pub dismissal_time_millis: Option<i64>,
}

impl CapturedNotification {
    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn body_or_empty(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Insert payload for a notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub app_name: String,
    pub app_id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub post_time_millis: i64,
    pub post_time_display: String,
    pub key: String,
}

impl NewNotification {
    /// False when both title and body are absent or whitespace-only.
    pub fn has_content(&self) -> bool {
        !is_blank(self.title.as_deref()) || !is_blank(self.body.as_deref())
    }
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}
