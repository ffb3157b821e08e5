use serde::{Deserialize, Serialize};

use super::notification::CapturedNotification;

/// Time-of-day band a notification falls into, by local hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeOfDay {
    UngodlyHours,
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => Self::UngodlyHours,
            6..=11 => Self::Morning,
            12..=15 => Self::Afternoon,
            16..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::UngodlyHours => "Ungodly Hours",
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
            Self::Evening => "Evening",
            Self::Night => "Night",
        }
    }

    /// Stable token used in header ids
    pub fn code(&self) -> &'static str {
        match self {
            Self::UngodlyHours => "UNGODLY",
            Self::Morning => "MORNING",
            Self::Afternoon => "AFTERNOON",
            Self::Evening => "EVENING",
            Self::Night => "NIGHT",
        }
    }
}

/// One row of the grouped history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListItem {
    DateHeader {
        label: String,
    },
    /// `id` is unique per (year, day-of-year, band)
    TimeHeader {
        time_of_day: TimeOfDay,
        id: String,
    },
    Notification(CapturedNotification),
}

impl ListItem {
    /// Key for list rendering. Date headers key on their label, which is
    /// unique within one grouped list.
    pub fn key(&self) -> String {
        match self {
            ListItem::DateHeader { label } => format!("date:{}", label),
            ListItem::TimeHeader { id, .. } => format!("time:{}", id),
            ListItem::Notification(n) => format!("notification:{}", n.id),
        }
    }

    pub fn as_notification(&self) -> Option<&CapturedNotification> {
        match self {
            ListItem::Notification(n) => Some(n),
            ListItem::DateHeader { .. } | ListItem::TimeHeader { .. } => None,
        }
    }
}
