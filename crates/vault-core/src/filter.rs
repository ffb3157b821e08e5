//! Ignore-list and keyword-rule filtering of captured notifications.

use std::collections::HashSet;

use crate::models::{CapturedNotification, FilterRule, IgnoredApp};

/// Notifications that survive the ignore list and every filter rule, in
/// their original order.
///
/// Ignored apps are dropped first; the rest are dropped when any active rule
/// matches. Applying the result again with the same inputs changes nothing.
pub fn visible(
    notifications: &[CapturedNotification],
    ignored_apps: &[IgnoredApp],
    rules: &[FilterRule],
) -> Vec<CapturedNotification> {
    if ignored_apps.is_empty() && rules.is_empty() {
        return notifications.to_vec();
    }

    let ignored: HashSet<&str> = ignored_apps.iter().map(|a| a.app_id.as_str()).collect();
    let active: Vec<&FilterRule> = rules.iter().filter(|r| r.is_active()).collect();

    notifications
        .iter()
        .filter(|n| !ignored.contains(n.app_id.as_str()))
        .filter(|n| !active.iter().any(|rule| rule.matches(n)))
        .cloned()
        .collect()
}
