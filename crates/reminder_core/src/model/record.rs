//! Notification record domain model.
//!
//! # Responsibility
//! - Define the durable record shown in the upcoming-notifications list.
//! - Keep the persisted JSON shape stable for the record store.
//!
//! # Invariants
//! - `id` is assigned once and reused by every reschedule of the record.
//! - `title` and `message` are non-empty after trimming.
//! - Serialized field names are `{id, title, message, date, category,
//!   repeat, notificationType}`.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier shared by a record and its live scheduler entry.
pub type NotificationId = String;

// `Date.toLocaleString()` output written by earlier builds, device-local.
const LOCALE_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y, %I:%M:%S %p",
    "%d/%m/%Y, %H:%M:%S",
    "%d.%m.%Y, %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// User-facing grouping for a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[default]
    General,
    Work,
    Personal,
}

/// How often a record fires after its first delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatPolicy {
    #[default]
    None,
    Daily,
    Weekly,
}

impl RepeatPolicy {
    pub fn is_repeating(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }
}

/// Notification type. Selects the action buttons attached on delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Snooze / Mark as Done actions.
    #[default]
    Reminder,
    /// Accept / Decline actions.
    #[serde(alias = "Task Notifications")]
    Task,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "Reminder",
            Self::Task => "Task",
        }
    }
}

/// Durable list entry persisted in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    /// Next delivery instant. Serialized as RFC 3339; locale strings from
    /// earlier builds are accepted on read.
    #[serde(rename = "date", deserialize_with = "date_from_stored")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub category: Category,
    #[serde(rename = "repeat", default)]
    pub repeat_policy: RepeatPolicy,
    #[serde(rename = "notificationType", default)]
    pub kind: NotificationKind,
}

impl NotificationRecord {
    /// Creates a record with a freshly generated id.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        kind: NotificationKind,
    ) -> Self {
        Self::with_id(generate_id(), title, message, scheduled_at, kind)
    }

    /// Creates a record with a caller-provided id.
    ///
    /// Used when rescheduling or editing keeps the original identity.
    pub fn with_id(
        id: impl Into<NotificationId>,
        title: impl Into<String>,
        message: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            message: message.into(),
            scheduled_at,
            category: Category::default(),
            repeat_policy: RepeatPolicy::default(),
            kind,
        }
    }

    /// Checks the record-level invariants.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.trim().is_empty() {
            return Err(RecordValidationError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(RecordValidationError::EmptyTitle);
        }
        if self.message.trim().is_empty() {
            return Err(RecordValidationError::EmptyMessage);
        }
        Ok(())
    }
}

/// Generates a new stable record id.
pub fn generate_id() -> NotificationId {
    Uuid::new_v4().to_string()
}

/// Validation failures for [`NotificationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordValidationError {
    EmptyId,
    EmptyTitle,
    EmptyMessage,
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "record id must not be empty"),
            Self::EmptyTitle => write!(f, "record title must not be empty"),
            Self::EmptyMessage => write!(f, "record message must not be empty"),
        }
    }
}

impl Error for RecordValidationError {}

// Older lists stored millisecond timestamps as numeric ids.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<NotificationId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Int(value) => value.to_string(),
        RawId::Float(value) => format!("{value}"),
    })
}

/// Parses a stored `date` value.
///
/// Accepts RFC 3339 first, then the locale layouts in
/// `LOCALE_DATE_FORMATS`, read as device-local time.
pub fn parse_stored_date(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.trim().replace(['\u{202f}', '\u{a0}'], " ");
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = LOCALE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())?;
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map_or_else(|| naive.and_utc(), |local| local.with_timezone(&Utc)),
    )
}

fn date_from_stored<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_stored_date(&raw).ok_or_else(|| D::Error::custom(format!("unrecognized date `{raw}`")))
}
