//! Notification payloads, triggers and scheduler events.
//!
//! # Responsibility
//! - Describe what the core hands to the OS scheduler and what it gets back.
//! - Carry `{id, type}` (plus `repeat` for series) in the payload data bag
//!   so an action can be handled without a record lookup.
//!
//! # Invariants
//! - The data bag is decoded with a schema check, never by raw field access.
//! - `AuthorizationStatus` ordering follows the platform levels
//!   (`NotDetermined < Denied < Authorized < Provisional`).

use crate::model::record::{NotificationId, NotificationKind, RepeatPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_CHANNEL_ID: &str = "default";
pub const DEFAULT_CHANNEL_NAME: &str = "Default Channel";

pub const ACTION_DEFAULT: &str = "default";
pub const ACTION_SNOOZE: &str = "snooze";
pub const ACTION_MARK_DONE: &str = "mark_done";
pub const ACTION_ACCEPT: &str = "accept";
pub const ACTION_DECLINE: &str = "decline";

const DATA_KEY_ID: &str = "id";
const DATA_KEY_TYPE: &str = "type";
const DATA_KEY_REPEAT: &str = "repeat";

/// Android notification channel. Other platforms ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub id: String,
    pub name: String,
}

impl Default for ChannelDescriptor {
    fn default() -> Self {
        Self {
            id: DEFAULT_CHANNEL_ID.to_string(),
            name: DEFAULT_CHANNEL_NAME.to_string(),
        }
    }
}

/// Identifier reported by the scheduler when a notification or one of its
/// buttons is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionId {
    /// Body tap that only opens the app.
    Default,
    Snooze,
    MarkDone,
    Accept,
    Decline,
    Other(String),
}

impl ActionId {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            ACTION_DEFAULT => Self::Default,
            ACTION_SNOOZE => Self::Snooze,
            ACTION_MARK_DONE => Self::MarkDone,
            ACTION_ACCEPT => Self::Accept,
            ACTION_DECLINE => Self::Decline,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Default => ACTION_DEFAULT,
            Self::Snooze => ACTION_SNOOZE,
            Self::MarkDone => ACTION_MARK_DONE,
            Self::Accept => ACTION_ACCEPT,
            Self::Decline => ACTION_DECLINE,
            Self::Other(value) => value.as_str(),
        }
    }
}

/// One button attached to a delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub title: String,
    pub action_id: ActionId,
}

impl NotificationAction {
    fn new(title: &str, action_id: ActionId) -> Self {
        Self {
            title: title.to_string(),
            action_id,
        }
    }
}

/// Returns the button set attached to notifications of `kind`.
pub fn actions_for(kind: NotificationKind) -> Vec<NotificationAction> {
    match kind {
        NotificationKind::Reminder => vec![
            NotificationAction::new("Snooze", ActionId::Snooze),
            NotificationAction::new("Mark as Done", ActionId::MarkDone),
        ],
        NotificationKind::Task => vec![
            NotificationAction::new("Accept", ActionId::Accept),
            NotificationAction::new("Decline", ActionId::Decline),
        ],
    }
}

/// Typed view of the payload data bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Absent from bags of one-shot notifications.
    #[serde(default)]
    pub repeat: RepeatPolicy,
}

impl NotificationData {
    pub fn to_data_bag(&self) -> BTreeMap<String, String> {
        let mut bag = BTreeMap::from([
            (DATA_KEY_ID.to_string(), self.id.clone()),
            (DATA_KEY_TYPE.to_string(), self.kind.as_str().to_string()),
        ]);
        if self.repeat.is_repeating() {
            bag.insert(DATA_KEY_REPEAT.to_string(), self.repeat.as_str().to_string());
        }
        bag
    }

    /// Decodes the data bag delivered back by the scheduler.
    pub fn from_data_bag(data: &BTreeMap<String, String>) -> Result<Self, PayloadDecodeError> {
        if !data.contains_key(DATA_KEY_TYPE) {
            return Err(PayloadDecodeError::MissingField(DATA_KEY_TYPE));
        }
        if !data.contains_key(DATA_KEY_ID) {
            return Err(PayloadDecodeError::MissingField(DATA_KEY_ID));
        }
        let value = serde_json::to_value(data)
            .map_err(|err| PayloadDecodeError::Malformed(err.to_string()))?;
        serde_json::from_value(value).map_err(|err| PayloadDecodeError::Malformed(err.to_string()))
    }
}

/// Data bag decode failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadDecodeError {
    MissingField(&'static str),
    Malformed(String),
}

impl Display for PayloadDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "notification data is missing `{field}`"),
            Self::Malformed(message) => write!(f, "notification data is malformed: {message}"),
        }
    }
}

impl Error for PayloadDecodeError {}

/// Notification content handed to, and delivered back from, the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub channel_id: String,
    /// Action reported for a body tap.
    pub press_action: ActionId,
    pub actions: Vec<NotificationAction>,
    /// Untyped string map preserved by the platform across deliveries.
    pub data: BTreeMap<String, String>,
    pub sound: Option<String>,
}

impl NotificationPayload {
    /// Builds a payload whose data bag carries `{id, type}`.
    pub fn new(
        id: impl Into<NotificationId>,
        title: impl Into<String>,
        body: impl Into<String>,
        kind: NotificationKind,
        channel_id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let data = NotificationData {
            id: id.clone(),
            kind,
            repeat: RepeatPolicy::None,
        };
        Self {
            id,
            title: title.into(),
            body: body.into(),
            channel_id: channel_id.into(),
            press_action: ActionId::Default,
            actions: actions_for(kind),
            data: data.to_data_bag(),
            sound: None,
        }
    }

    /// Records the repeat policy of the series this payload belongs to.
    pub fn with_repeat(mut self, repeat: RepeatPolicy) -> Self {
        if repeat.is_repeating() {
            self.data
                .insert(DATA_KEY_REPEAT.to_string(), repeat.as_str().to_string());
        } else {
            self.data.remove(DATA_KEY_REPEAT);
        }
        self
    }

    pub fn decode_data(&self) -> Result<NotificationData, PayloadDecodeError> {
        NotificationData::from_data_bag(&self.data)
    }
}

/// Platform repeat interval for timestamp triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatFrequency {
    Daily,
    Weekly,
}

impl RepeatFrequency {
    pub fn from_policy(policy: RepeatPolicy) -> Option<Self> {
        match policy {
            RepeatPolicy::None => None,
            RepeatPolicy::Daily => Some(Self::Daily),
            RepeatPolicy::Weekly => Some(Self::Weekly),
        }
    }
}

/// Fires once at `timestamp`, then every `repeat_frequency` when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampTrigger {
    pub timestamp: DateTime<Utc>,
    pub repeat_frequency: Option<RepeatFrequency>,
}

impl TimestampTrigger {
    pub fn once(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            repeat_frequency: None,
        }
    }

    pub fn repeating(timestamp: DateTime<Utc>, policy: RepeatPolicy) -> Self {
        Self {
            timestamp,
            repeat_frequency: RepeatFrequency::from_policy(policy),
        }
    }
}

/// Result of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
}

impl AuthorizationStatus {
    /// Granted iff at or above `Authorized`.
    pub fn is_granted(self) -> bool {
        self >= Self::Authorized
    }
}

/// Scheduler event kinds the core distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Notification body pressed.
    Press,
    /// One of the notification buttons pressed.
    ActionPress,
    Dismissed,
    Delivered,
    Unknown,
}

/// Event emitted by the scheduler, foreground or background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub kind: EventType,
    pub notification: Option<NotificationPayload>,
    /// `None` when the platform reported no action id.
    pub press_action: Option<ActionId>,
}

impl NotificationEvent {
    pub fn press(notification: NotificationPayload, action: Option<ActionId>) -> Self {
        let kind = match action {
            Some(ActionId::Default) | None => EventType::Press,
            Some(_) => EventType::ActionPress,
        };
        Self {
            kind,
            notification: Some(notification),
            press_action: action,
        }
    }

    /// Returns whether this event should reach action routing.
    pub fn is_press(&self) -> bool {
        matches!(self.kind, EventType::Press | EventType::ActionPress)
    }
}

/// Notification that launched the app from a cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialNotification {
    pub notification: NotificationPayload,
    pub press_action: Option<ActionId>,
}
