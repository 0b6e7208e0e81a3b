//! Scheduler contract implemented by the host platform.
//!
//! # Responsibility
//! - Define the async seam between the core and the OS notification engine.
//!
//! # Invariants
//! - `create_trigger_notification` upserts by payload id: a second call with
//!   the same id replaces the live entry instead of adding one.
//! - `cancel_notification` removes both the pending trigger and the
//!   displayed instance for an id; `cancel_displayed_notification` removes
//!   only a delivered instance and leaves a pending trigger alone.
//! - Cancelling an unknown id is not an error.

use crate::notification::payload::{
    AuthorizationStatus, ChannelDescriptor, InitialNotification, NotificationPayload,
    TimestampTrigger,
};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchedulerOperation {
    RequestPermission,
    CreateChannel,
    CreateTriggerNotification,
    DisplayNotification,
    CancelNotification,
    CancelDisplayedNotification,
    IncrementBadgeCount,
    GetInitialNotification,
}

impl SchedulerOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestPermission => "request_permission",
            Self::CreateChannel => "create_channel",
            Self::CreateTriggerNotification => "create_trigger_notification",
            Self::DisplayNotification => "display_notification",
            Self::CancelNotification => "cancel_notification",
            Self::CancelDisplayedNotification => "cancel_displayed_notification",
            Self::IncrementBadgeCount => "increment_badge_count",
            Self::GetInitialNotification => "get_initial_notification",
        }
    }
}

/// Failure reported by the platform scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerError {
    pub operation: SchedulerOperation,
    pub message: String,
}

impl SchedulerError {
    pub fn new(operation: SchedulerOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scheduler {} failed: {}",
            self.operation.as_str(),
            self.message
        )
    }
}

impl Error for SchedulerError {}

/// OS notification facility.
///
/// Event delivery is not part of this trait: the host forwards foreground
/// events into the manager's subscription channel and calls
/// `handle_background_event` for events delivered while the app is closed.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    async fn request_permission(&self) -> SchedulerResult<AuthorizationStatus>;

    /// Returns the created channel id.
    async fn create_channel(&self, channel: &ChannelDescriptor) -> SchedulerResult<String>;

    async fn create_trigger_notification(
        &self,
        payload: &NotificationPayload,
        trigger: &TimestampTrigger,
    ) -> SchedulerResult<()>;

    async fn display_notification(&self, payload: &NotificationPayload) -> SchedulerResult<()>;

    async fn cancel_notification(&self, id: &str) -> SchedulerResult<()>;

    async fn cancel_displayed_notification(&self, id: &str) -> SchedulerResult<()>;

    async fn increment_badge_count(&self) -> SchedulerResult<()>;

    /// Returns the notification whose press launched the app, if any.
    async fn get_initial_notification(&self) -> SchedulerResult<Option<InitialNotification>>;
}
