use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vault_core::{CoreConfig, StaticResolver};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Where the notification database lives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Package id of this app; its own posts are never captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_app_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<i64>,

    /// Package id to display name, standing in for the system app lookup
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub app_names: HashMap<String, String>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Core settings: environment first, then this file, then `data_dir`.
    pub fn core_config(&self, data_dir: Option<PathBuf>) -> CoreConfig {
        let mut config = CoreConfig::from_env();
        if let Some(dir) = data_dir.or_else(|| self.data_dir.clone()) {
            config.data_dir = dir;
        }
        if let Some(ref id) = self.self_app_id {
            config.self_app_id = id.clone();
        }
        if let Some(days) = self.retention_days {
            config.retention_days = days;
        }
        config
    }

    pub fn resolver(&self) -> StaticResolver {
        self.app_names
            .iter()
            .fold(StaticResolver::new(), |resolver, (id, name)| {
                resolver.with_app(id.clone(), name.clone())
            })
    }
}
