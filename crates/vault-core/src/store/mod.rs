pub mod db;
pub mod error;

pub use db::Database;
pub use error::{Result, StoreError};

use tokio::sync::watch;

use crate::models::{CapturedNotification, FilterRule, IgnoredApp, NewNotification, Scope};

/// Per-table write counters. Each successful write that changes a table
/// bumps that table's counter, so observers know which queries to re-run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreRevision {
    pub notifications: u64,
    pub ignored_apps: u64,
    pub filter_rules: u64,
}

/// Persistence for captured notifications, ignored apps and filter rules.
pub trait NotificationStore: Send + Sync {
    /// Insert a notification, returning its assigned id.
    fn insert(&self, notification: &NewNotification) -> Result<i64>;

    /// Mark every notification posted under `key` as dismissed.
    /// Returns the number of rows updated; an unknown key updates nothing.
    fn mark_dismissed(&self, key: &str, at_millis: i64) -> Result<usize>;

    fn delete_by_ids(&self, ids: &[i64]) -> Result<usize>;

    /// Delete notifications posted before `cutoff_millis`.
    fn delete_older_than(&self, cutoff_millis: i64) -> Result<usize>;

    fn delete_all(&self) -> Result<usize>;

    /// Notifications posted at or after `since_millis` that fall in `scope`,
    /// newest first.
    fn notifications(&self, scope: &Scope, since_millis: i64) -> Result<Vec<CapturedNotification>>;

    /// Distinct app display names, case-insensitive ascending.
    fn app_names(&self) -> Result<Vec<String>>;

    /// Resolve a display name to the app id it was first captured under.
    fn app_id_for_name(&self, app_name: &str) -> Result<Option<String>>;

    fn add_ignored_app(&self, app_id: &str) -> Result<()>;
    fn remove_ignored_app(&self, app_id: &str) -> Result<()>;
    fn ignored_apps(&self) -> Result<Vec<IgnoredApp>>;

    /// Insert a rule (`id: None`) or replace the rule with the same id.
    fn save_filter_rule(&self, rule: &FilterRule) -> Result<i64>;
    fn delete_filter_rule(&self, id: i64) -> Result<()>;
    /// Rules, newest first.
    fn filter_rules(&self) -> Result<Vec<FilterRule>>;

    fn subscribe(&self) -> watch::Receiver<StoreRevision>;
}
