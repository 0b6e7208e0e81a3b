//! User notification preferences.
//!
//! Mirrors the settings screen toggles. Stored next to the record list and
//! consulted by the scheduling gate.

use crate::model::record::NotificationKind;
use serde::{Deserialize, Serialize};

/// Sound played on delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSound {
    #[default]
    Default,
    Custom,
}

impl NotificationSound {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Custom => "custom",
        }
    }
}

/// Persisted notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    /// Master switch for every scheduled notification.
    pub enabled: bool,
    pub reminders_enabled: bool,
    pub tasks_enabled: bool,
    pub sound: NotificationSound,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reminders_enabled: true,
            tasks_enabled: true,
            sound: NotificationSound::Default,
        }
    }
}

impl NotificationSettings {
    /// Returns whether notifications of `kind` may be scheduled.
    pub fn allows(&self, kind: NotificationKind) -> bool {
        if !self.enabled {
            return false;
        }
        match kind {
            NotificationKind::Reminder => self.reminders_enabled,
            NotificationKind::Task => self.tasks_enabled,
        }
    }
}
