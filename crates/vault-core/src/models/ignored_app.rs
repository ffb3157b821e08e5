use serde::{Deserialize, Serialize};

/// An app whose notifications are hidden from every view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IgnoredApp {
    pub app_id: String,
}

impl IgnoredApp {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }
}
