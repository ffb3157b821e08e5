//! Application-wide constants
//!
//! Centralized location for the fixed windows and defaults shared by the
//! capture pipeline, the store and the feed.

/// Identifier the host application posts its own notifications under.
/// Events from this app are never captured.
pub const DEFAULT_SELF_APP_ID: &str = "com.notifvault.app";

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "notifications.db";

/// Captured notifications older than this are excluded from every view
/// and removed by the startup sweep.
pub const RETENTION_DAYS: i64 = 7;

/// Two identical post events closer than this are treated as one.
pub const CAPTURE_DEBOUNCE_MS: i64 = 500;

/// Search input must be idle this long before the feed recomputes.
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// Android NotificationListenerService removal reasons
pub mod removal_reasons {
    /// User dismissed a single notification
    pub const CANCEL: i32 = 2;
    /// User dismissed all notifications
    pub const CANCEL_ALL: i32 = 3;
    /// Posting app cancelled the notification itself
    pub const APP_CANCEL: i32 = 8;
}
