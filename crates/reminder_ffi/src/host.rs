//! Scheduler seam that hands side effects back to the Flutter host.
//!
//! # Responsibility
//! - Let FFI calls run the core lifecycle manager unchanged.
//! - Record every scheduler call as a [`SchedulerCommand`] the host replays
//!   against the platform notification plugin.
//!
//! # Invariants
//! - Authorization is whatever the host reported for the current call.
//! - Commands come back in call order.
//! - There is never a cold-start notification here; the host forwards the
//!   launching press through `notification_handle_press` instead.

use crate::api::{NotificationDataEntry, SchedulerCommand};
use async_trait::async_trait;
use parking_lot::Mutex;
use reminder_core::{
    AuthorizationStatus, ChannelDescriptor, InitialNotification, NotificationPayload,
    NotificationScheduler, RepeatFrequency, SchedulerOperation, SchedulerResult,
    TimestampTrigger,
};

pub(crate) struct HostScheduler {
    authorization: AuthorizationStatus,
    commands: Mutex<Vec<SchedulerCommand>>,
}

impl HostScheduler {
    pub(crate) fn new(authorization: AuthorizationStatus) -> Self {
        Self {
            authorization,
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Drains the commands recorded so far.
    pub(crate) fn take_commands(&self) -> Vec<SchedulerCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    fn push(&self, command: SchedulerCommand) {
        self.commands.lock().push(command);
    }
}

#[async_trait]
impl NotificationScheduler for HostScheduler {
    async fn request_permission(&self) -> SchedulerResult<AuthorizationStatus> {
        Ok(self.authorization)
    }

    async fn create_channel(&self, channel: &ChannelDescriptor) -> SchedulerResult<String> {
        let mut command = SchedulerCommand::bare(SchedulerOperation::CreateChannel, None);
        command.channel_id = Some(channel.id.clone());
        command.title = Some(channel.name.clone());
        self.push(command);
        Ok(channel.id.clone())
    }

    async fn create_trigger_notification(
        &self,
        payload: &NotificationPayload,
        trigger: &TimestampTrigger,
    ) -> SchedulerResult<()> {
        let mut command =
            SchedulerCommand::for_payload(SchedulerOperation::CreateTriggerNotification, payload);
        command.timestamp_epoch_ms = Some(trigger.timestamp.timestamp_millis());
        command.repeat_frequency = trigger.repeat_frequency.map(|frequency| {
            match frequency {
                RepeatFrequency::Daily => "daily",
                RepeatFrequency::Weekly => "weekly",
            }
            .to_string()
        });
        self.push(command);
        Ok(())
    }

    async fn display_notification(&self, payload: &NotificationPayload) -> SchedulerResult<()> {
        self.push(SchedulerCommand::for_payload(
            SchedulerOperation::DisplayNotification,
            payload,
        ));
        Ok(())
    }

    async fn cancel_notification(&self, id: &str) -> SchedulerResult<()> {
        self.push(SchedulerCommand::bare(
            SchedulerOperation::CancelNotification,
            Some(id),
        ));
        Ok(())
    }

    async fn cancel_displayed_notification(&self, id: &str) -> SchedulerResult<()> {
        self.push(SchedulerCommand::bare(
            SchedulerOperation::CancelDisplayedNotification,
            Some(id),
        ));
        Ok(())
    }

    async fn increment_badge_count(&self) -> SchedulerResult<()> {
        self.push(SchedulerCommand::bare(
            SchedulerOperation::IncrementBadgeCount,
            None,
        ));
        Ok(())
    }

    async fn get_initial_notification(&self) -> SchedulerResult<Option<InitialNotification>> {
        Ok(None)
    }
}

impl SchedulerCommand {
    fn bare(operation: SchedulerOperation, notification_id: Option<&str>) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            notification_id: notification_id.map(str::to_string),
            title: None,
            body: None,
            channel_id: None,
            timestamp_epoch_ms: None,
            repeat_frequency: None,
            sound: None,
            press_action: None,
            action_ids: Vec::new(),
            action_titles: Vec::new(),
            data: Vec::new(),
        }
    }

    fn for_payload(operation: SchedulerOperation, payload: &NotificationPayload) -> Self {
        Self {
            title: Some(payload.title.clone()),
            body: Some(payload.body.clone()),
            channel_id: Some(payload.channel_id.clone()),
            sound: payload.sound.clone(),
            press_action: Some(payload.press_action.as_str().to_string()),
            action_ids: payload
                .actions
                .iter()
                .map(|action| action.action_id.as_str().to_string())
                .collect(),
            action_titles: payload
                .actions
                .iter()
                .map(|action| action.title.clone())
                .collect(),
            data: payload
                .data
                .iter()
                .map(|(key, value)| NotificationDataEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            ..Self::bare(operation, Some(payload.id.as_str()))
        }
    }
}
