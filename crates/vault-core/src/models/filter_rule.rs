use serde::{Deserialize, Serialize};

use super::notification::{is_blank, CapturedNotification};
use crate::search::text_contains_term;

/// User-defined keyword rule that hides matching notifications.
///
/// A rule is scoped to one app when `app_id` is set, otherwise it applies to
/// every app. It only ever matches when at least one keyword is non-blank;
/// a rule with both keywords blank stays stored but is inert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Store-assigned identity; `None` until saved
    pub id: Option<i64>,
    /// Display name of the scoped app, kept for rule listings
    pub app_name: Option<String>,
    pub app_id: Option<String>,
    pub title_keyword: Option<String>,
    pub content_keyword: Option<String>,
}

impl FilterRule {
    pub fn is_active(&self) -> bool {
        !is_blank(self.title_keyword.as_deref()) || !is_blank(self.content_keyword.as_deref())
    }

    pub fn matches(&self, notification: &CapturedNotification) -> bool {
        if let Some(app_id) = &self.app_id {
            if *app_id != notification.app_id {
                return false;
            }
        }

        self.is_active()
            && keyword_matches(self.title_keyword.as_deref(), notification.title_or_empty())
            && keyword_matches(self.content_keyword.as_deref(), notification.body_or_empty())
    }
}

/// A blank keyword matches anything; otherwise case-insensitive containment.
fn keyword_matches(keyword: Option<&str>, text: &str) -> bool {
    match keyword {
        Some(k) if !k.trim().is_empty() => text_contains_term(text, k),
        _ => true,
    }
}
