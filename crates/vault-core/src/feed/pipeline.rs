//! Live feed: keeps a filtered, searched and grouped view of the store
//! current as inputs change.
//!
//! A single task owns the input state. Store reads and the recomputation run
//! on the blocking pool; every recomputation carries a generation number and
//! only results newer than the published one are kept.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::combine::{CombineLatest, FeedInputs, InputChange};
use super::selection::Selection;
use crate::config::CoreConfig;
use crate::filter;
use crate::grouping;
use crate::models::{CapturedNotification, FilterRule, ListItem, Scope, Tab};
use crate::search;
use crate::store::{self, NotificationStore, StoreError, StoreRevision};

pub type SnapshotReceiver = watch::Receiver<Option<Arc<FeedSnapshot>>>;

/// One published state of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSnapshot {
    pub generation: u64,
    pub scope: Scope,
    pub query: Option<String>,
    /// Rows left after ignore list, rules and search, newest first
    pub visible: Vec<CapturedNotification>,
    pub grouped: Vec<ListItem>,
    /// Distinct app names among the visible rows
    pub app_names: Vec<String>,
}

/// Filter, search and group one input set. `now` decides the day labels.
pub fn compute_snapshot<Tz: TimeZone>(
    inputs: &FeedInputs,
    generation: u64,
    now: &DateTime<Tz>,
) -> FeedSnapshot {
    let filtered = filter::visible(&inputs.raw, &inputs.ignored, &inputs.rules);
    let visible = search::search(&filtered, inputs.query.as_deref());
    let grouped = grouping::group_notifications(&visible, now);

    FeedSnapshot {
        generation,
        scope: inputs.scope.clone(),
        query: inputs.query.clone(),
        app_names: grouping::app_names(&visible),
        visible,
        grouped,
    }
}

/// Publish `snapshot` unless something at least as new is already out.
fn publish(tx: &watch::Sender<Option<Arc<FeedSnapshot>>>, snapshot: FeedSnapshot) -> bool {
    let generation = snapshot.generation;
    let published = tx.send_if_modified(|current| {
        if current
            .as_ref()
            .map_or(false, |c| c.generation >= generation)
        {
            return false;
        }
        *current = Some(Arc::new(snapshot));
        true
    });
    if !published {
        debug!("Dropped stale feed snapshot {}", generation);
    }
    published
}

async fn run_blocking<T, F>(store: &Arc<dyn NotificationStore>, f: F) -> store::Result<T>
where
    F: FnOnce(&dyn NotificationStore) -> store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

#[derive(Debug)]
enum FeedCommand {
    SetQuery(Option<String>),
    SetTab(Tab),
    SetApp(Option<String>),
    Refresh,
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
#[error("Feed pipeline has stopped")]
pub struct FeedStopped;

/// Cloneable access to a running feed.
#[derive(Clone)]
pub struct FeedHandle {
    store: Arc<dyn NotificationStore>,
    retention_millis: i64,
    command_tx: mpsc::UnboundedSender<FeedCommand>,
    snapshot_rx: SnapshotReceiver,
    selection: Arc<Mutex<Selection>>,
}

impl FeedHandle {
    fn send(&self, command: FeedCommand) -> Result<(), FeedStopped> {
        self.command_tx.send(command).map_err(|_| FeedStopped)
    }

    /// Latest published snapshot, `None` until every input has loaded.
    pub fn snapshot(&self) -> Option<Arc<FeedSnapshot>> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_rx.clone()
    }

    /// Takes effect once no further query arrives within the debounce window.
    pub fn set_search_query(&self, query: Option<String>) -> Result<(), FeedStopped> {
        self.send(FeedCommand::SetQuery(query))
    }

    pub fn set_tab(&self, tab: Tab) -> Result<(), FeedStopped> {
        self.send(FeedCommand::SetTab(tab))
    }

    pub fn set_tab_index(&self, index: usize) -> Result<(), FeedStopped> {
        self.set_tab(Tab::from_index(index))
    }

    /// Scope to the app shown under `app_name`, or to every app with `None`.
    pub fn set_app_filter(&self, app_name: Option<String>) -> Result<(), FeedStopped> {
        self.send(FeedCommand::SetApp(app_name))
    }

    /// Re-read every input; moves the retention window and day labels along.
    pub fn refresh(&self) -> Result<(), FeedStopped> {
        self.send(FeedCommand::Refresh)
    }

    pub async fn app_names(&self) -> store::Result<Vec<String>> {
        run_blocking(&self.store, |s| s.app_names()).await
    }

    fn spawn_write<F>(&self, action: &'static str, f: F) -> JoinHandle<()>
    where
        F: FnOnce(&dyn NotificationStore) -> store::Result<()> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = run_blocking(&store, f).await {
                error!("Failed to {}: {}", action, e);
            }
        })
    }

    pub fn ignore_app(&self, app_id: impl Into<String>) -> JoinHandle<()> {
        let app_id = app_id.into();
        self.spawn_write("ignore app", move |s| s.add_ignored_app(&app_id))
    }

    pub fn unignore_app(&self, app_id: impl Into<String>) -> JoinHandle<()> {
        let app_id = app_id.into();
        self.spawn_write("unignore app", move |s| s.remove_ignored_app(&app_id))
    }

    pub fn save_filter_rule(&self, rule: FilterRule) -> JoinHandle<()> {
        self.spawn_write("save filter rule", move |s| s.save_filter_rule(&rule).map(|_| ()))
    }

    pub fn delete_filter_rule(&self, id: i64) -> JoinHandle<()> {
        self.spawn_write("delete filter rule", move |s| s.delete_filter_rule(id))
    }

    pub fn delete_all(&self) -> JoinHandle<()> {
        self.selection.lock().take_for_delete();
        self.spawn_write("delete all notifications", |s| s.delete_all().map(|_| ()))
    }

    /// Delete the selected rows and leave selection mode.
    pub fn delete_selected(&self) -> JoinHandle<()> {
        let ids = self.selection.lock().take_for_delete();
        self.spawn_write("delete selected notifications", move |s| {
            s.delete_by_ids(&ids).map(|_| ())
        })
    }

    pub fn cleanup_old(&self) -> JoinHandle<()> {
        let cutoff = Utc::now().timestamp_millis() - self.retention_millis;
        self.spawn_write("clean up old notifications", move |s| {
            s.delete_older_than(cutoff).map(|_| ())
        })
    }

    pub fn selection(&self) -> Selection {
        self.selection.lock().clone()
    }

    pub fn toggle_selection_mode(&self) {
        self.selection.lock().toggle_mode();
    }

    pub fn activate_selection(&self, id: i64) {
        self.selection.lock().activate(id);
    }

    pub fn toggle_selected(&self, id: i64) {
        self.selection.lock().toggle(id);
    }

    pub fn clear_selection(&self) {
        self.selection.lock().clear();
    }

    /// Select every row in the current snapshot.
    pub fn select_all_visible(&self) {
        let ids: Vec<i64> = self
            .snapshot()
            .map(|s| s.visible.iter().map(|n| n.id).collect())
            .unwrap_or_default();
        self.selection.lock().select_all(ids);
    }
}

/// Owns the background task driving a [`FeedHandle`].
pub struct FeedPipeline {
    handle: FeedHandle,
    task: Option<JoinHandle<()>>,
}

impl FeedPipeline {
    /// Start the feed on the current Tokio runtime.
    ///
    /// Old notifications are swept first, then every input is loaded; the
    /// first snapshot is published once all of them are in.
    pub fn spawn(store: Arc<dyn NotificationStore>, config: &CoreConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(None);

        let worker = FeedWorker {
            store: store.clone(),
            config: config.clone(),
            search_debounce: Duration::from_millis(config.search_debounce_ms),
            command_rx,
            revisions: store.subscribe(),
            seen: StoreRevision::default(),
            snapshot_tx: Arc::new(snapshot_tx),
            combine: CombineLatest::new(),
            scope: Scope::default(),
            query: None,
            pending_query: None,
            generation: 0,
        };
        let task = tokio::spawn(worker.run());

        Self {
            handle: FeedHandle {
                store,
                retention_millis: config.retention_millis(),
                command_tx,
                snapshot_rx,
                selection: Arc::new(Mutex::new(Selection::default())),
            },
            task: Some(task),
        }
    }

    pub fn handle(&self) -> FeedHandle {
        self.handle.clone()
    }

    pub async fn shutdown(mut self) {
        let _ = self.handle.send(FeedCommand::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Feed task ended abnormally: {}", e);
            }
        }
    }
}

struct FeedWorker {
    store: Arc<dyn NotificationStore>,
    config: CoreConfig,
    search_debounce: Duration,
    command_rx: mpsc::UnboundedReceiver<FeedCommand>,
    revisions: watch::Receiver<StoreRevision>,
    seen: StoreRevision,
    snapshot_tx: Arc<watch::Sender<Option<Arc<FeedSnapshot>>>>,
    combine: CombineLatest,
    scope: Scope,
    /// Query last handed to the combiner
    query: Option<String>,
    pending_query: Option<(Option<String>, Instant)>,
    generation: u64,
}

impl FeedWorker {
    async fn run(mut self) {
        self.sweep().await;
        self.seen = *self.revisions.borrow_and_update();

        let scope = self.scope.clone();
        self.push(InputChange::Scope(scope));
        self.push(InputChange::Query(None));
        self.reload_ignored().await;
        self.reload_rules().await;
        self.reload_raw().await;
        info!("Feed pipeline started");

        loop {
            let deadline = self.pending_query.as_ref().map(|(_, at)| *at);
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(FeedCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                changed = self.revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let revision = *self.revisions.borrow_and_update();
                    self.on_revision(revision).await;
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some((query, _)) = self.pending_query.take() {
                        self.apply_query(query);
                    }
                }
            }
        }

        info!("Feed pipeline stopped");
    }

    async fn handle_command(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::SetQuery(query) => {
                // A newer query replaces the pending one and restarts the wait
                self.pending_query = Some((query, Instant::now() + self.search_debounce));
            }
            FeedCommand::SetTab(tab) => {
                if tab != self.scope.tab {
                    self.scope.tab = tab;
                    self.change_scope().await;
                }
            }
            FeedCommand::SetApp(app_name) => {
                let app_id = match app_name {
                    Some(name) => self.resolve_app(name).await,
                    None => None,
                };
                if app_id != self.scope.app_id {
                    self.scope.app_id = app_id;
                    self.change_scope().await;
                }
            }
            FeedCommand::Refresh => {
                self.reload_ignored().await;
                self.reload_rules().await;
                self.reload_raw().await;
            }
            FeedCommand::Shutdown => {}
        }
    }

    fn apply_query(&mut self, query: Option<String>) {
        if query == self.query {
            return;
        }
        debug!("Search query set to {:?}", query);
        self.query = query.clone();
        self.push(InputChange::Query(query));
    }

    async fn change_scope(&mut self) {
        debug!("Feed scope changed to {:?}", self.scope);
        self.push(InputChange::Scope(self.scope.clone()));
        self.reload_raw().await;
    }

    /// Unknown names fall back to the all-apps scope.
    async fn resolve_app(&self, app_name: String) -> Option<String> {
        let lookup = app_name.clone();
        match run_blocking(&self.store, move |s| s.app_id_for_name(&lookup)).await {
            Ok(Some(app_id)) => Some(app_id),
            Ok(None) => {
                warn!("No app id recorded for {}, showing all apps", app_name);
                None
            }
            Err(e) => {
                error!("Failed to resolve app {}: {}", app_name, e);
                None
            }
        }
    }

    async fn on_revision(&mut self, revision: StoreRevision) {
        let seen = std::mem::replace(&mut self.seen, revision);
        if revision.ignored_apps != seen.ignored_apps {
            self.reload_ignored().await;
        }
        if revision.filter_rules != seen.filter_rules {
            self.reload_rules().await;
        }
        if revision.notifications != seen.notifications {
            self.reload_raw().await;
        }
    }

    async fn sweep(&self) {
        let cutoff = self.config.retention_cutoff(Utc::now().timestamp_millis());
        if let Err(e) = run_blocking(&self.store, move |s| s.delete_older_than(cutoff)).await {
            error!("Retention sweep failed: {}", e);
        }
    }

    async fn reload_raw(&mut self) {
        let scope = self.scope.clone();
        let query_scope = scope.clone();
        let since = self.config.retention_cutoff(Utc::now().timestamp_millis());
        match run_blocking(&self.store, move |s| s.notifications(&query_scope, since)).await {
            Ok(rows) => self.push(InputChange::Raw { scope, rows }),
            Err(e) => error!("Failed to load notifications: {}", e),
        }
    }

    async fn reload_ignored(&mut self) {
        match run_blocking(&self.store, |s| s.ignored_apps()).await {
            Ok(ignored) => self.push(InputChange::Ignored(ignored)),
            Err(e) => error!("Failed to load ignored apps: {}", e),
        }
    }

    async fn reload_rules(&mut self) {
        match run_blocking(&self.store, |s| s.filter_rules()).await {
            Ok(rules) => self.push(InputChange::Rules(rules)),
            Err(e) => error!("Failed to load filter rules: {}", e),
        }
    }

    /// Feed a change to the combiner and recompute if the gate is open.
    fn push(&mut self, change: InputChange) {
        let Some(inputs) = self.combine.apply(change) else {
            return;
        };
        let inputs = inputs.clone();
        self.generation += 1;
        let generation = self.generation;
        let snapshot_tx = self.snapshot_tx.clone();
        tokio::task::spawn_blocking(move || {
            let snapshot = compute_snapshot(&inputs, generation, &Local::now());
            publish(&snapshot_tx, snapshot);
        });
    }
}
