use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tab {
    #[default]
    All,
    Dismissed,
}

impl Tab {
    /// Unknown indices fall back to `All`.
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::Dismissed,
            _ => Self::All,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::All => 0,
            Self::Dismissed => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Dismissed => "Dismissed",
        }
    }
}

/// Which rows the feed pulls from the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub tab: Tab,
    /// Restrict to one app; `None` means every app
    pub app_id: Option<String>,
}

impl Scope {
    pub fn new(tab: Tab, app_id: Option<String>) -> Self {
        Self { tab, app_id }
    }
}
