use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directives for the stderr layer, e.g. `vault_core=debug`
pub const LOG_ENV: &str = "NOTIF_VAULT_LOG";
/// Path of an extra debug-level log file
pub const LOG_FILE_ENV: &str = "NOTIF_VAULT_LOG_FILE";

pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Install the global subscriber. `default_directives` applies when
/// `NOTIF_VAULT_LOG` is unset or invalid. Later calls are no-ops.
pub fn init_tracing_with_default(default_directives: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directives));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file_layer = std::env::var(LOG_FILE_ENV).ok().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => Some((log_path, file)),
            Err(e) => {
                eprintln!("Could not open log file {}: {}", log_path, e);
                None
            }
        }
    });

    let result = if let Some((log_path, file)) = file_layer {
        let layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
        let result = registry.with(layer).try_init();
        if result.is_ok() {
            eprintln!("File logging enabled: {}", log_path);
        }
        result
    } else {
        registry.try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing already initialized");
    }
}
