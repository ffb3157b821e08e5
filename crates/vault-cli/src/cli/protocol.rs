use std::path::PathBuf;

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Feed one posted notification through the listener
    Capture {
        app_id: String,
        title: Option<String>,
        body: Option<String>,
        key: Option<String>,
        time_millis: Option<i64>,
    },
    /// Feed JSON-lines listener events through the capture worker
    Replay { path: PathBuf },
    /// Report a removal
    Dismiss { key: String, reason: i32 },
    /// Print one feed snapshot
    List {
        dismissed: bool,
        app: Option<String>,
        search: Option<String>,
        grouped: bool,
    },
    Apps,
    Ignore { app_id: String },
    Unignore { app_id: String },
    Ignored,
    Rule(RuleCommand),
    Delete { ids: Vec<i64> },
    Clear,
    Sweep,
}

#[derive(Debug, Clone)]
pub enum RuleCommand {
    Add {
        app_name: Option<String>,
        app_id: Option<String>,
        title: Option<String>,
        content: Option<String>,
    },
    List,
    Delete { id: i64 },
}
