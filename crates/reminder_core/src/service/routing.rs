//! Pure action routing shared by foreground, background and cold-start
//! paths.
//!
//! # Invariants
//! - Routing depends only on the reported action id.
//! - Unknown action ids route to `Ignore`; they are never errors.

use crate::notification::payload::ActionId;
use chrono::{DateTime, Duration, Utc};

/// Default snooze interval.
pub const DEFAULT_SNOOZE_MINUTES: i64 = 10;

/// What a press should do to its notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRoute {
    /// No transition: body tap, task buttons, unknown ids.
    Ignore,
    /// Reschedule the same id `snooze_minutes` from now.
    Snooze,
    /// Cancel the notification and drop its record.
    MarkDone,
}

impl ActionRoute {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Snooze => "snooze",
            Self::MarkDone => "mark_done",
        }
    }
}

/// Maps a reported action id to its route.
pub fn resolve_action(action: Option<&ActionId>) -> ActionRoute {
    match action {
        Some(ActionId::Snooze) => ActionRoute::Snooze,
        Some(ActionId::MarkDone) => ActionRoute::MarkDone,
        Some(ActionId::Default)
        | Some(ActionId::Accept)
        | Some(ActionId::Decline)
        | Some(ActionId::Other(_))
        | None => ActionRoute::Ignore,
    }
}

/// Returns the delivery time of a snooze issued at `now`.
pub fn snooze_deadline(now: DateTime<Utc>, snooze_minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(snooze_minutes)
}
