//! Capture pipeline: turns notification-listener callbacks into store writes.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::CoreConfig;
use crate::constants::removal_reasons;
use crate::models::NewNotification;
use crate::store::NotificationStore;

const POST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A notification as handed over by the system on post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEvent {
    pub app_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub post_time_millis: i64,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// User swiped away a single notification
    UserCancel,
    /// User cleared all notifications
    UserCancelAll,
    /// The posting app removed it
    AppCancel,
    Other(i32),
}

impl RemovalReason {
    pub fn from_code(code: i32) -> Self {
        match code {
            removal_reasons::CANCEL => Self::UserCancel,
            removal_reasons::CANCEL_ALL => Self::UserCancelAll,
            removal_reasons::APP_CANCEL => Self::AppCancel,
            other => Self::Other(other),
        }
    }

    pub fn is_user_dismissal(&self) -> bool {
        matches!(self, Self::UserCancel | Self::UserCancelAll)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("App not found: {0}")]
    NotFound(String),
}

/// Looks up app metadata from a package identifier.
pub trait AppResolver: Send + Sync {
    fn resolve(&self, app_id: &str) -> Result<AppInfo, ResolveError>;
}

/// Resolver backed by a fixed id → display name table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    names: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, app_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(app_id.into(), name.into());
        self
    }
}

impl AppResolver for StaticResolver {
    fn resolve(&self, app_id: &str) -> Result<AppInfo, ResolveError> {
        self.names
            .get(app_id)
            .map(|name| AppInfo {
                display_name: name.clone(),
            })
            .ok_or_else(|| ResolveError::NotFound(app_id.to_string()))
    }
}

/// Format epoch millis as local "YYYY-MM-DD HH:MM:SS"; empty when out of range.
pub fn format_post_time(millis: i64) -> String {
    format_post_time_in(millis, &Local)
}

pub fn format_post_time_in<Tz>(millis: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(millis).earliest() {
        Some(dt) => dt.format(POST_TIME_FORMAT).to_string(),
        None => String::new(),
    }
}

/// The most recently accepted post, compared against the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastAccepted {
    pub app_name: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub post_time_millis: i64,
}

impl LastAccepted {
    fn is_repeat(&self, app_name: &str, event: &PostedEvent, window_ms: i64) -> bool {
        let apart = event.post_time_millis.abs_diff(self.post_time_millis);
        self.app_name == app_name
            && self.title == event.title
            && self.body == event.body
            && u64::try_from(window_ms).map_or(false, |window| apart < window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Stored(i64),
    /// Posted by this app itself
    SelfPosted,
    /// Neither title nor body
    NoContent,
    /// Same as the last accepted post and inside the debounce window
    Debounced,
    /// Accepted but the insert failed; not retried
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissOutcome {
    Marked(usize),
    /// Not a user dismissal
    Ignored,
    Failed,
}

/// Receives listener callbacks and writes accepted notifications to the store.
pub struct NotificationListener {
    store: Arc<dyn NotificationStore>,
    resolver: Arc<dyn AppResolver>,
    self_app_id: String,
    debounce_ms: i64,
    last_accepted: Option<LastAccepted>,
}

impl NotificationListener {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        resolver: Arc<dyn AppResolver>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            self_app_id: config.self_app_id.clone(),
            debounce_ms: config.capture_debounce_ms,
            last_accepted: None,
        }
    }

    pub fn last_accepted(&self) -> Option<&LastAccepted> {
        self.last_accepted.as_ref()
    }

    /// Forget the last accepted post, as on a listener restart.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    fn app_name(&self, app_id: &str) -> String {
        match self.resolver.resolve(app_id) {
            Ok(info) => info.display_name,
            Err(e) => {
                warn!("{}; using package id as name", e);
                app_id.to_string()
            }
        }
    }

    pub fn on_posted(&mut self, event: &PostedEvent) -> CaptureOutcome {
        if event.app_id == self.self_app_id {
            return CaptureOutcome::SelfPosted;
        }

        let app_name = self.app_name(&event.app_id);

        let notification = NewNotification {
            app_name: app_name.clone(),
            app_id: event.app_id.clone(),
            title: event.title.clone(),
            body: event.body.clone(),
            post_time_millis: event.post_time_millis,
            post_time_display: String::new(),
            key: event.key.clone(),
        };
        if !notification.has_content() {
            debug!(
                "Skipping notification with no title or text from {} (key: {})",
                app_name, event.key
            );
            return CaptureOutcome::NoContent;
        }

        if let Some(last) = &self.last_accepted {
            if last.is_repeat(&app_name, event, self.debounce_ms) {
                debug!("Debounced duplicate from {} (key: {})", app_name, event.key);
                return CaptureOutcome::Debounced;
            }
        }
        self.last_accepted = Some(LastAccepted {
            app_name,
            title: event.title.clone(),
            body: event.body.clone(),
            post_time_millis: event.post_time_millis,
        });

        let notification = NewNotification {
            post_time_display: format_post_time(event.post_time_millis),
            ..notification
        };
        match self.store.insert(&notification) {
            Ok(id) => {
                debug!("Notification saved: {} - {:?}", notification.app_name, notification.title);
                CaptureOutcome::Stored(id)
            }
            Err(e) => {
                error!("Error saving notification from {}: {}", notification.app_id, e);
                CaptureOutcome::Failed
            }
        }
    }

    pub fn on_removed(&mut self, key: &str, reason: RemovalReason) -> DismissOutcome {
        if !reason.is_user_dismissal() {
            return DismissOutcome::Ignored;
        }

        match self.store.mark_dismissed(key, Utc::now().timestamp_millis()) {
            Ok(updated) => {
                debug!("Marked {} notification(s) dismissed for key {}", updated, key);
                DismissOutcome::Marked(updated)
            }
            Err(e) => {
                error!("Error marking notification {} as dismissed: {}", key, e);
                DismissOutcome::Failed
            }
        }
    }
}

/// A listener callback queued for the capture worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerEvent {
    Posted(PostedEvent),
    Removed { key: String, reason: i32 },
}

enum CaptureCommand {
    Event(ListenerEvent),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
#[error("Capture worker has stopped")]
pub struct CaptureStopped;

#[derive(Clone)]
pub struct CaptureHandle {
    command_tx: Sender<CaptureCommand>,
}

impl CaptureHandle {
    /// Queue an event. Fails only once the worker has stopped.
    pub fn send(&self, event: ListenerEvent) -> Result<(), CaptureStopped> {
        self.command_tx
            .send(CaptureCommand::Event(event))
            .map_err(|_| CaptureStopped)
    }
}

/// Background thread that feeds queued events to a listener one at a time.
pub struct CaptureWorker {
    handle: CaptureHandle,
    worker_handle: Option<JoinHandle<NotificationListener>>,
}

impl CaptureWorker {
    pub fn spawn(mut listener: NotificationListener) -> Self {
        let (command_tx, command_rx) = mpsc::channel::<CaptureCommand>();
        let worker_handle = std::thread::spawn(move || {
            run_listener(&mut listener, command_rx);
            listener
        });
        info!("Capture worker started");

        Self {
            handle: CaptureHandle { command_tx },
            worker_handle: Some(worker_handle),
        }
    }

    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }

    /// Stop the worker and hand back the listener with its state.
    pub fn shutdown(mut self) -> Option<NotificationListener> {
        let _ = self.handle.command_tx.send(CaptureCommand::Shutdown);
        let listener = self.worker_handle.take().and_then(|h| h.join().ok());
        info!("Capture worker stopped");
        listener
    }
}

fn run_listener(listener: &mut NotificationListener, command_rx: Receiver<CaptureCommand>) {
    while let Ok(command) = command_rx.recv() {
        match command {
            CaptureCommand::Event(ListenerEvent::Posted(event)) => {
                listener.on_posted(&event);
            }
            CaptureCommand::Event(ListenerEvent::Removed { key, reason }) => {
                listener.on_removed(&key, RemovalReason::from_code(reason));
            }
            CaptureCommand::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapturedNotification, FilterRule, IgnoredApp, Scope};
    use crate::store::{Database, Result as StoreResult, StoreError, StoreRevision};
    use tokio::sync::watch;

    const SELF_ID: &str = "com.notifvault.app";

    fn listener_with(store: Arc<dyn NotificationStore>) -> NotificationListener {
        let resolver = StaticResolver::new().with_app("com.chat", "Chat");
        NotificationListener::new(store, Arc::new(resolver), &CoreConfig::new("unused"))
    }

    fn setup() -> (Arc<Database>, NotificationListener) {
        let db = Arc::new(Database::in_memory().unwrap());
        let listener = listener_with(db.clone());
        (db, listener)
    }

    fn posted(app_id: &str, title: Option<&str>, body: Option<&str>, at: i64) -> PostedEvent {
        PostedEvent {
            app_id: app_id.to_string(),
            title: title.map(str::to_string),
            body: body.map(str::to_string),
            post_time_millis: at,
            key: format!("0|{}|{}", app_id, at),
        }
    }

    fn stored(db: &Database) -> Vec<CapturedNotification> {
        db.notifications(&Scope::default(), 0).unwrap()
    }

    #[test]
    fn test_stores_with_resolved_name() {
        let (db, mut listener) = setup();
        let outcome = listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 1_000));
        assert!(matches!(outcome, CaptureOutcome::Stored(_)));

        let rows = stored(&db);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_name, "Chat");
        assert_eq!(rows[0].app_id, "com.chat");
        assert!(!rows[0].is_dismissed);
        assert_eq!(rows[0].post_time_display, format_post_time(1_000));
    }

    #[test]
    fn test_unresolved_app_falls_back_to_id() {
        let (db, mut listener) = setup();
        listener.on_posted(&posted("org.unknown", Some("x"), None, 1_000));
        assert_eq!(stored(&db)[0].app_name, "org.unknown");
    }

    #[test]
    fn test_self_posted_skipped() {
        let (db, mut listener) = setup();
        let outcome = listener.on_posted(&posted(SELF_ID, Some("x"), Some("y"), 1_000));
        assert_eq!(outcome, CaptureOutcome::SelfPosted);
        assert!(stored(&db).is_empty());
    }

    #[test]
    fn test_no_content_skipped() {
        let (db, mut listener) = setup();
        assert_eq!(
            listener.on_posted(&posted("com.chat", None, None, 1_000)),
            CaptureOutcome::NoContent
        );
        assert_eq!(
            listener.on_posted(&posted("com.chat", Some(" "), Some(""), 2_000)),
            CaptureOutcome::NoContent
        );
        assert!(stored(&db).is_empty());
        assert!(listener.last_accepted().is_none());
    }

    #[test]
    fn test_debounce_inside_window() {
        let (db, mut listener) = setup();
        listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 10_000));
        let outcome = listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 10_499));
        assert_eq!(outcome, CaptureOutcome::Debounced);
        assert_eq!(stored(&db).len(), 1);
    }

    #[test]
    fn test_debounce_boundary_is_exclusive() {
        let (db, mut listener) = setup();
        listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 10_000));
        let outcome = listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 10_500));
        assert!(matches!(outcome, CaptureOutcome::Stored(_)));
        assert_eq!(stored(&db).len(), 2);
    }

    #[test]
    fn test_debounce_window_is_symmetric() {
        let (db, mut listener) = setup();
        listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 10_000));
        // Delivered late with an earlier post time
        let outcome = listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 9_700));
        assert_eq!(outcome, CaptureOutcome::Debounced);
        assert_eq!(stored(&db).len(), 1);
    }

    #[test]
    fn test_extreme_post_times_do_not_overflow() {
        let (db, mut listener) = setup();
        let first = listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), i64::MAX));
        assert!(matches!(first, CaptureOutcome::Stored(_)));
        let second = listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), -5));
        assert!(matches!(second, CaptureOutcome::Stored(_)));
        let third = listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), i64::MIN));
        assert!(matches!(third, CaptureOutcome::Stored(_)));
        assert_eq!(stored(&db).len(), 3);
    }

    #[test]
    fn test_different_content_not_debounced() {
        let (db, mut listener) = setup();
        listener.on_posted(&posted("com.chat", Some("Alice"), Some("hi"), 10_000));
        listener.on_posted(&posted("com.chat", Some("Alice"), Some("hello"), 10_100));
        listener.on_posted(&posted("org.other", Some("Alice"), Some("hello"), 10_200));
        assert_eq!(stored(&db).len(), 3);
    }

    #[test]
    fn test_only_last_accepted_is_remembered() {
        // A, B, A inside the window: B breaks adjacency so all three persist
        let (db, mut listener) = setup();
        listener.on_posted(&posted("com.chat", Some("A"), None, 10_000));
        listener.on_posted(&posted("com.chat", Some("B"), None, 10_100));
        listener.on_posted(&posted("com.chat", Some("A"), None, 10_200));
        assert_eq!(stored(&db).len(), 3);
    }

    #[test]
    fn test_reset_clears_last_accepted() {
        let (db, mut listener) = setup();
        listener.on_posted(&posted("com.chat", Some("A"), None, 10_000));
        listener.reset();
        listener.on_posted(&posted("com.chat", Some("A"), None, 10_100));
        assert_eq!(stored(&db).len(), 2);
    }

    #[test]
    fn test_user_dismissal_marks_row() {
        let (db, mut listener) = setup();
        let event = posted("com.chat", Some("Alice"), None, 1_000);
        listener.on_posted(&event);

        let outcome = listener.on_removed(&event.key, RemovalReason::from_code(2));
        assert_eq!(outcome, DismissOutcome::Marked(1));

        let row = &stored(&db)[0];
        assert!(row.is_dismissed);
        assert!(row.dismissal_time_millis.unwrap() >= row.post_time_millis);
    }

    #[test]
    fn test_cancel_all_counts_as_user_dismissal() {
        assert!(RemovalReason::from_code(3).is_user_dismissal());
        assert!(!RemovalReason::from_code(8).is_user_dismissal());
        assert!(!RemovalReason::from_code(1).is_user_dismissal());
    }

    #[test]
    fn test_app_cancel_ignored() {
        let (db, mut listener) = setup();
        let event = posted("com.chat", Some("Alice"), None, 1_000);
        listener.on_posted(&event);

        assert_eq!(
            listener.on_removed(&event.key, RemovalReason::AppCancel),
            DismissOutcome::Ignored
        );
        assert!(!stored(&db)[0].is_dismissed);
    }

    #[test]
    fn test_unknown_key_is_noop() {
        let (db, mut listener) = setup();
        assert_eq!(
            listener.on_removed("missing", RemovalReason::UserCancel),
            DismissOutcome::Marked(0)
        );
        assert!(stored(&db).is_empty());
    }

    #[test]
    fn test_format_post_time() {
        assert_eq!(format_post_time_in(0, &Utc), "1970-01-01 00:00:00");
        assert_eq!(format_post_time_in(1_741_612_245_000, &Utc), "2025-03-10 13:10:45");
        assert_eq!(format_post_time_in(i64::MAX, &Utc), "");
    }

    /// Store whose writes always fail
    struct BrokenStore {
        revisions: watch::Sender<StoreRevision>,
    }

    impl BrokenStore {
        fn new() -> Self {
            Self {
                revisions: watch::channel(StoreRevision::default()).0,
            }
        }

        fn fail<T>() -> StoreResult<T> {
            Err(StoreError::Task("disk full".to_string()))
        }
    }

    impl NotificationStore for BrokenStore {
        fn insert(&self, _: &NewNotification) -> StoreResult<i64> {
            Self::fail()
        }
        fn mark_dismissed(&self, _: &str, _: i64) -> StoreResult<usize> {
            Self::fail()
        }
        fn delete_by_ids(&self, _: &[i64]) -> StoreResult<usize> {
            Self::fail()
        }
        fn delete_older_than(&self, _: i64) -> StoreResult<usize> {
            Self::fail()
        }
        fn delete_all(&self) -> StoreResult<usize> {
            Self::fail()
        }
        fn notifications(&self, _: &Scope, _: i64) -> StoreResult<Vec<CapturedNotification>> {
            Self::fail()
        }
        fn app_names(&self) -> StoreResult<Vec<String>> {
            Self::fail()
        }
        fn app_id_for_name(&self, _: &str) -> StoreResult<Option<String>> {
            Self::fail()
        }
        fn add_ignored_app(&self, _: &str) -> StoreResult<()> {
            Self::fail()
        }
        fn remove_ignored_app(&self, _: &str) -> StoreResult<()> {
            Self::fail()
        }
        fn ignored_apps(&self) -> StoreResult<Vec<IgnoredApp>> {
            Self::fail()
        }
        fn save_filter_rule(&self, _: &FilterRule) -> StoreResult<i64> {
            Self::fail()
        }
        fn delete_filter_rule(&self, _: i64) -> StoreResult<()> {
            Self::fail()
        }
        fn filter_rules(&self) -> StoreResult<Vec<FilterRule>> {
            Self::fail()
        }
        fn subscribe(&self) -> watch::Receiver<StoreRevision> {
            self.revisions.subscribe()
        }
    }

    #[test]
    fn test_store_failures_are_swallowed() {
        let mut listener = listener_with(Arc::new(BrokenStore::new()));
        let event = posted("com.chat", Some("Alice"), None, 1_000);

        assert_eq!(listener.on_posted(&event), CaptureOutcome::Failed);
        // The failed post still counts as last accepted
        assert_eq!(listener.on_posted(&event), CaptureOutcome::Debounced);
        assert_eq!(
            listener.on_removed(&event.key, RemovalReason::UserCancel),
            DismissOutcome::Failed
        );
    }

    #[test]
    fn test_worker_processes_events_in_order() {
        let db = Arc::new(Database::in_memory().unwrap());
        let worker = CaptureWorker::spawn(listener_with(db.clone()));
        let handle = worker.handle();

        let first = posted("com.chat", Some("Alice"), None, 1_000);
        handle.send(ListenerEvent::Posted(first.clone())).unwrap();
        handle
            .send(ListenerEvent::Posted(posted("com.chat", Some("Alice"), None, 1_100)))
            .unwrap();
        handle
            .send(ListenerEvent::Removed {
                key: first.key.clone(),
                reason: removal_reasons::CANCEL,
            })
            .unwrap();

        let listener = worker.shutdown().unwrap();
        assert_eq!(listener.last_accepted().map(|l| l.post_time_millis), Some(1_000));

        let rows = stored(&db);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_dismissed);
        assert!(handle.send(ListenerEvent::Posted(first)).is_err());
    }

    #[test]
    fn test_worker_survives_extreme_post_time() {
        let db = Arc::new(Database::in_memory().unwrap());
        let worker = CaptureWorker::spawn(listener_with(db.clone()));
        let handle = worker.handle();

        handle
            .send(ListenerEvent::Posted(posted("com.chat", Some("x"), None, i64::MAX)))
            .unwrap();
        handle
            .send(ListenerEvent::Posted(posted("com.chat", Some("x"), None, -5)))
            .unwrap();
        handle
            .send(ListenerEvent::Posted(posted("com.chat", Some("y"), None, 1_000)))
            .unwrap();

        let listener = worker.shutdown().unwrap();
        assert_eq!(listener.last_accepted().map(|l| l.post_time_millis), Some(1_000));
        assert_eq!(stored(&db).len(), 3);
    }
}
