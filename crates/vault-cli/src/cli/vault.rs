use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use vault_core::capture::{CaptureOutcome, DismissOutcome};
use vault_core::models::{CapturedNotification, FilterRule, Tab};
use vault_core::search::highlight;
use vault_core::{
    CaptureWorker, CoreConfig, Database, FeedPipeline, FeedSnapshot, ListenerEvent,
    NotificationListener, NotificationStore, PostedEvent, RemovalReason, StaticResolver,
};

use super::protocol::{CliCommand, RuleCommand};

/// How long `list` waits for the feed to settle
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// An opened notification database plus the settings to run commands on it.
pub struct Vault {
    config: CoreConfig,
    store: Arc<Database>,
    resolver: Arc<StaticResolver>,
}

impl Vault {
    pub fn open(config: CoreConfig, resolver: StaticResolver) -> Result<Self> {
        let path = config.database_path();
        let store = Database::new(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Self {
            config,
            store: Arc::new(store),
            resolver: Arc::new(resolver),
        })
    }

    fn listener(&self) -> NotificationListener {
        NotificationListener::new(self.store.clone(), self.resolver.clone(), &self.config)
    }

    pub fn execute(&self, command: CliCommand) -> Result<Value> {
        match command {
            CliCommand::Capture {
                app_id,
                title,
                body,
                key,
                time_millis,
            } => {
                let post_time_millis = time_millis.unwrap_or_else(|| Utc::now().timestamp_millis());
                let key = key.unwrap_or_else(|| format!("{}|{}", app_id, post_time_millis));
                let event = PostedEvent {
                    app_id,
                    title,
                    body,
                    post_time_millis,
                    key,
                };
                Ok(capture_json(self.listener().on_posted(&event)))
            }
            CliCommand::Replay { path } => self.replay(&path),
            CliCommand::Dismiss { key, reason } => {
                let outcome = self
                    .listener()
                    .on_removed(&key, RemovalReason::from_code(reason));
                Ok(dismiss_json(outcome))
            }
            CliCommand::List {
                dismissed,
                app,
                search,
                grouped,
            } => {
                let tab = if dismissed { Tab::Dismissed } else { Tab::All };
                self.list(tab, app, search, grouped)
            }
            CliCommand::Apps => Ok(json!(self.store.app_names()?)),
            CliCommand::Ignore { app_id } => {
                self.store.add_ignored_app(&app_id)?;
                Ok(json!({ "ignored": app_id }))
            }
            CliCommand::Unignore { app_id } => {
                self.store.remove_ignored_app(&app_id)?;
                Ok(json!({ "unignored": app_id }))
            }
            CliCommand::Ignored => {
                let ids: Vec<String> = self
                    .store
                    .ignored_apps()?
                    .into_iter()
                    .map(|app| app.app_id)
                    .collect();
                Ok(json!(ids))
            }
            CliCommand::Rule(rule) => self.rule(rule),
            CliCommand::Delete { ids } => Ok(json!({ "deleted": self.store.delete_by_ids(&ids)? })),
            CliCommand::Clear => Ok(json!({ "deleted": self.store.delete_all()? })),
            CliCommand::Sweep => {
                let cutoff = self.config.retention_cutoff(Utc::now().timestamp_millis());
                Ok(json!({ "deleted": self.store.delete_older_than(cutoff)? }))
            }
        }
    }

    fn replay(&self, path: &Path) -> Result<Value> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open event file: {}", path.display()))?;

        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: ListenerEvent = serde_json::from_str(&line)
                .with_context(|| format!("Invalid event on line {}", index + 1))?;
            events.push(event);
        }

        let worker = CaptureWorker::spawn(self.listener());
        let handle = worker.handle();
        for event in &events {
            handle.send(event.clone())?;
        }
        worker.shutdown();
        info!("Replayed {} events from {}", events.len(), path.display());

        Ok(json!({ "events": events.len() }))
    }

    fn list(
        &self,
        tab: Tab,
        app: Option<String>,
        query: Option<String>,
        grouped: bool,
    ) -> Result<Value> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        let snapshot = runtime.block_on(self.snapshot(tab, app, query))?;

        let query = snapshot.query.as_deref();
        let mut output = json!({
            "tab": tab.label(),
            "app_id": snapshot.scope.app_id,
            "query": snapshot.query,
            "count": snapshot.visible.len(),
        });
        let body = if grouped {
            ("items", serde_json::to_value(&snapshot.grouped)?)
        } else {
            let rows = snapshot
                .visible
                .iter()
                .map(|n| notification_json(n, query))
                .collect::<Result<Vec<_>>>()?;
            ("notifications", Value::Array(rows))
        };
        if let Value::Object(map) = &mut output {
            map.insert(body.0.to_string(), body.1);
        }
        Ok(output)
    }

    /// Run the feed once with the requested inputs and take its first
    /// snapshot that reflects all of them.
    async fn snapshot(
        &self,
        tab: Tab,
        app: Option<String>,
        query: Option<String>,
    ) -> Result<Arc<FeedSnapshot>> {
        let mut config = self.config.clone();
        config.search_debounce_ms = 0;

        let pipeline = FeedPipeline::spawn(self.store.clone(), &config);
        let handle = pipeline.handle();
        // Names with no recorded app id fall back to all apps
        let wants_app = match &app {
            Some(name) => self.store.app_id_for_name(name)?.is_some(),
            None => false,
        };
        handle.set_tab(tab)?;
        handle.set_app_filter(app)?;
        handle.set_search_query(query.clone())?;

        let mut rx = handle.subscribe();
        let snapshot = {
            let waited = tokio::time::timeout(
                SNAPSHOT_TIMEOUT,
                rx.wait_for(|current| {
                    current.as_ref().map_or(false, |s| {
                        s.scope.tab == tab
                            && s.scope.app_id.is_some() == wants_app
                            && s.query == query
                    })
                }),
            )
            .await;
            match waited {
                Ok(Ok(current)) => (*current).clone(),
                _ => None,
            }
        };

        pipeline.shutdown().await;
        snapshot.context("Feed did not produce a snapshot")
    }

    fn rule(&self, command: RuleCommand) -> Result<Value> {
        match command {
            RuleCommand::Add {
                app_name,
                app_id,
                title,
                content,
            } => {
                let blank = |k: &Option<String>| k.as_deref().map_or(true, |k| k.trim().is_empty());
                if blank(&title) && blank(&content) {
                    bail!("A filter rule needs a title or content keyword");
                }
                let app_id = match (app_id, &app_name) {
                    (Some(id), _) => Some(id),
                    (None, Some(name)) => Some(
                        self.store
                            .app_id_for_name(name)?
                            .with_context(|| format!("No notifications recorded for app {}", name))?,
                    ),
                    (None, None) => None,
                };
                let rule = FilterRule {
                    id: None,
                    app_name,
                    app_id,
                    title_keyword: title,
                    content_keyword: content,
                };
                let id = self.store.save_filter_rule(&rule)?;
                Ok(json!({ "id": id }))
            }
            RuleCommand::List => Ok(serde_json::to_value(self.store.filter_rules()?)?),
            RuleCommand::Delete { id } => {
                self.store.delete_filter_rule(id)?;
                Ok(json!({ "deleted": id }))
            }
        }
    }
}

fn capture_json(outcome: CaptureOutcome) -> Value {
    match outcome {
        CaptureOutcome::Stored(id) => json!({ "status": "stored", "id": id }),
        CaptureOutcome::SelfPosted => json!({ "status": "self_posted" }),
        CaptureOutcome::NoContent => json!({ "status": "no_content" }),
        CaptureOutcome::Debounced => json!({ "status": "debounced" }),
        CaptureOutcome::Failed => json!({ "status": "failed" }),
    }
}

fn dismiss_json(outcome: DismissOutcome) -> Value {
    match outcome {
        DismissOutcome::Marked(updated) => json!({ "status": "dismissed", "updated": updated }),
        DismissOutcome::Ignored => json!({ "status": "ignored" }),
        DismissOutcome::Failed => json!({ "status": "failed" }),
    }
}

/// Row as JSON, with match segments when a search is active.
fn notification_json(n: &CapturedNotification, query: Option<&str>) -> Result<Value> {
    let mut value = serde_json::to_value(n)?;
    if let (Some(q), Value::Object(map)) = (query.filter(|q| !q.trim().is_empty()), &mut value) {
        map.insert(
            "highlights".to_string(),
            json!({
                "app_name": highlight(&n.app_name, q),
                "title": highlight(n.title_or_empty(), q),
                "body": highlight(n.body_or_empty(), q),
            }),
        );
    }
    Ok(value)
}
