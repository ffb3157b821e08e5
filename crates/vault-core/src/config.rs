use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    CAPTURE_DEBOUNCE_MS, DATABASE_FILE, DEFAULT_SELF_APP_ID, MILLIS_PER_DAY,
    RETENTION_DAYS, SEARCH_DEBOUNCE_MS,
};

/// Overrides the data directory when set
pub const DATA_DIR_ENV: &str = "NOTIF_VAULT_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    /// Our own package id; notifications posted under it are never captured
    pub self_app_id: String,
    pub retention_days: i64,
    pub capture_debounce_ms: i64,
    pub search_debounce_ms: u64,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            self_app_id: DEFAULT_SELF_APP_ID.to_string(),
            retention_days: RETENTION_DAYS,
            capture_debounce_ms: CAPTURE_DEBOUNCE_MS,
            search_debounce_ms: SEARCH_DEBOUNCE_MS,
        }
    }

    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(write_err)
    }

    /// Default config with `NOTIF_VAULT_DATA_DIR` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn retention_millis(&self) -> i64 {
        self.retention_days * MILLIS_PER_DAY
    }

    /// Oldest post time still inside the retention window at `now_millis`.
    pub fn retention_cutoff(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.retention_millis())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("notif-vault"))
            .unwrap_or_else(|| PathBuf::from("notif_vault_data"));
        Self::new(data_dir)
    }
}
