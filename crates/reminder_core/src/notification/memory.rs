//! In-process scheduler used by tests and the CLI.
//!
//! # Invariants
//! - Live entries are keyed by notification id (upsert semantics).
//! - An entry is either pending on a trigger or displayed, never both.
//! - Injected failures fire once, on the next call of that operation.

use crate::notification::payload::{
    AuthorizationStatus, ChannelDescriptor, InitialNotification, NotificationPayload,
    RepeatFrequency, TimestampTrigger,
};
use crate::notification::scheduler::{
    NotificationScheduler, SchedulerError, SchedulerOperation, SchedulerResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// Delivery state of a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for its trigger.
    Pending,
    /// Shown to the user.
    Displayed,
}

/// Notification currently known to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEntry {
    pub payload: NotificationPayload,
    /// `None` for notifications displayed immediately.
    pub trigger: Option<TimestampTrigger>,
    pub state: EntryState,
}

#[derive(Debug)]
struct SchedulerState {
    authorization: AuthorizationStatus,
    channels: BTreeMap<String, ChannelDescriptor>,
    live: BTreeMap<String, LiveEntry>,
    badge_count: u32,
    initial: Option<InitialNotification>,
    calls: Vec<SchedulerOperation>,
    fail_next: BTreeSet<SchedulerOperation>,
}

/// Map-backed [`NotificationScheduler`].
#[derive(Debug)]
pub struct InMemoryScheduler {
    state: Mutex<SchedulerState>,
}

impl Default for InMemoryScheduler {
    fn default() -> Self {
        Self::with_authorization(AuthorizationStatus::Authorized)
    }
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_authorization(authorization: AuthorizationStatus) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                authorization,
                channels: BTreeMap::new(),
                live: BTreeMap::new(),
                badge_count: 0,
                initial: None,
                calls: Vec::new(),
                fail_next: BTreeSet::new(),
            }),
        }
    }

    pub fn set_authorization(&self, authorization: AuthorizationStatus) {
        self.state.lock().authorization = authorization;
    }

    /// Sets the notification reported by `get_initial_notification`.
    pub fn set_initial_notification(&self, initial: Option<InitialNotification>) {
        self.state.lock().initial = initial;
    }

    /// Makes the next call of `operation` fail.
    pub fn fail_next(&self, operation: SchedulerOperation) {
        self.state.lock().fail_next.insert(operation);
    }

    /// Fires every pending trigger due at `now`.
    ///
    /// One-shot entries become displayed. Repeating entries are displayed
    /// as a copy and stay pending at their next occurrence; the copy is
    /// returned but not tracked separately since it shares the id.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Vec<NotificationPayload> {
        let mut state = self.state.lock();
        let mut delivered = Vec::new();
        for entry in state.live.values_mut() {
            let Some(trigger) = entry.trigger.as_mut() else {
                continue;
            };
            if entry.state != EntryState::Pending || trigger.timestamp > now {
                continue;
            }
            delivered.push(entry.payload.clone());
            match trigger.repeat_frequency {
                Some(frequency) => {
                    while trigger.timestamp <= now {
                        trigger.timestamp += repeat_step(frequency);
                    }
                }
                None => entry.state = EntryState::Displayed,
            }
        }
        delivered
    }

    pub fn live_entry(&self, id: &str) -> Option<LiveEntry> {
        self.state.lock().live.get(id).cloned()
    }

    pub fn live_ids(&self) -> Vec<String> {
        self.state.lock().live.keys().cloned().collect()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn badge_count(&self) -> u32 {
        self.state.lock().badge_count
    }

    pub fn channel(&self, id: &str) -> Option<ChannelDescriptor> {
        self.state.lock().channels.get(id).cloned()
    }

    /// Returns every operation invoked so far, in call order.
    pub fn calls(&self) -> Vec<SchedulerOperation> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: SchedulerOperation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    fn begin(&self, operation: SchedulerOperation) -> SchedulerResult<()> {
        let mut state = self.state.lock();
        state.calls.push(operation);
        if state.fail_next.remove(&operation) {
            return Err(SchedulerError::new(operation, "injected failure"));
        }
        Ok(())
    }
}

fn repeat_step(frequency: RepeatFrequency) -> Duration {
    match frequency {
        RepeatFrequency::Daily => Duration::days(1),
        RepeatFrequency::Weekly => Duration::weeks(1),
    }
}

#[async_trait]
impl NotificationScheduler for InMemoryScheduler {
    async fn request_permission(&self) -> SchedulerResult<AuthorizationStatus> {
        self.begin(SchedulerOperation::RequestPermission)?;
        Ok(self.state.lock().authorization)
    }

    async fn create_channel(&self, channel: &ChannelDescriptor) -> SchedulerResult<String> {
        self.begin(SchedulerOperation::CreateChannel)?;
        self.state
            .lock()
            .channels
            .insert(channel.id.clone(), channel.clone());
        Ok(channel.id.clone())
    }

    async fn create_trigger_notification(
        &self,
        payload: &NotificationPayload,
        trigger: &TimestampTrigger,
    ) -> SchedulerResult<()> {
        self.begin(SchedulerOperation::CreateTriggerNotification)?;
        self.state.lock().live.insert(
            payload.id.clone(),
            LiveEntry {
                payload: payload.clone(),
                trigger: Some(*trigger),
                state: EntryState::Pending,
            },
        );
        Ok(())
    }

    async fn display_notification(&self, payload: &NotificationPayload) -> SchedulerResult<()> {
        self.begin(SchedulerOperation::DisplayNotification)?;
        self.state.lock().live.insert(
            payload.id.clone(),
            LiveEntry {
                payload: payload.clone(),
                trigger: None,
                state: EntryState::Displayed,
            },
        );
        Ok(())
    }

    async fn cancel_notification(&self, id: &str) -> SchedulerResult<()> {
        self.begin(SchedulerOperation::CancelNotification)?;
        self.state.lock().live.remove(id);
        Ok(())
    }

    async fn cancel_displayed_notification(&self, id: &str) -> SchedulerResult<()> {
        self.begin(SchedulerOperation::CancelDisplayedNotification)?;
        let mut state = self.state.lock();
        if state
            .live
            .get(id)
            .is_some_and(|entry| entry.state == EntryState::Displayed)
        {
            state.live.remove(id);
        }
        Ok(())
    }

    async fn increment_badge_count(&self) -> SchedulerResult<()> {
        self.begin(SchedulerOperation::IncrementBadgeCount)?;
        self.state.lock().badge_count += 1;
        Ok(())
    }

    async fn get_initial_notification(&self) -> SchedulerResult<Option<InitialNotification>> {
        self.begin(SchedulerOperation::GetInitialNotification)?;
        Ok(self.state.lock().initial.take())
    }
}

#[cfg(test)]
mod tests {
    use super::{EntryState, InMemoryScheduler};
    use crate::model::record::{NotificationKind, RepeatPolicy};
    use crate::notification::payload::{
        InitialNotification, NotificationPayload, TimestampTrigger,
    };
    use crate::notification::scheduler::{NotificationScheduler, SchedulerOperation};
    use chrono::{Duration, Utc};

    fn payload(id: &str) -> NotificationPayload {
        NotificationPayload::new(id, "title", "body", NotificationKind::Reminder, "default")
    }

    #[tokio::test]
    async fn trigger_notifications_upsert_by_id() {
        let scheduler = InMemoryScheduler::new();
        let first = Utc::now() + Duration::minutes(5);
        let second = first + Duration::hours(1);

        scheduler
            .create_trigger_notification(&payload("a"), &TimestampTrigger::once(first))
            .await
            .unwrap();
        scheduler
            .create_trigger_notification(&payload("a"), &TimestampTrigger::once(second))
            .await
            .unwrap();

        assert_eq!(scheduler.live_count(), 1);
        let entry = scheduler.live_entry("a").unwrap();
        assert_eq!(entry.trigger.unwrap().timestamp, second);
    }

    #[tokio::test]
    async fn cancel_displayed_leaves_pending_trigger() {
        let scheduler = InMemoryScheduler::new();
        let at = Utc::now() + Duration::minutes(5);
        scheduler
            .create_trigger_notification(&payload("a"), &TimestampTrigger::once(at))
            .await
            .unwrap();

        scheduler.cancel_displayed_notification("a").await.unwrap();
        assert_eq!(scheduler.live_count(), 1);

        scheduler.deliver_due(at);
        assert_eq!(
            scheduler.live_entry("a").unwrap().state,
            EntryState::Displayed
        );
        scheduler.cancel_displayed_notification("a").await.unwrap();
        assert_eq!(scheduler.live_count(), 0);
    }

    #[tokio::test]
    async fn repeating_trigger_stays_pending_after_delivery() {
        let scheduler = InMemoryScheduler::new();
        let at = Utc::now();
        scheduler
            .create_trigger_notification(
                &payload("daily"),
                &TimestampTrigger::repeating(at, RepeatPolicy::Daily),
            )
            .await
            .unwrap();

        let delivered = scheduler.deliver_due(at + Duration::minutes(1));
        assert_eq!(delivered.len(), 1);
        let entry = scheduler.live_entry("daily").unwrap();
        assert_eq!(entry.state, EntryState::Pending);
        assert_eq!(entry.trigger.unwrap().timestamp, at + Duration::days(1));
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_ok() {
        let scheduler = InMemoryScheduler::new();
        scheduler.cancel_notification("missing").await.unwrap();
        assert_eq!(scheduler.live_count(), 0);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let scheduler = InMemoryScheduler::new();
        scheduler.fail_next(SchedulerOperation::CancelNotification);

        let err = scheduler.cancel_notification("a").await.unwrap_err();
        assert_eq!(err.operation, SchedulerOperation::CancelNotification);
        scheduler.cancel_notification("a").await.unwrap();
        assert_eq!(
            scheduler.call_count(SchedulerOperation::CancelNotification),
            2
        );
    }

    #[tokio::test]
    async fn initial_notification_is_consumed_once() {
        let scheduler = InMemoryScheduler::new();
        scheduler.set_initial_notification(Some(InitialNotification {
            notification: payload("boot"),
            press_action: None,
        }));

        assert!(scheduler.get_initial_notification().await.unwrap().is_some());
        assert!(scheduler.get_initial_notification().await.unwrap().is_none());
    }
}
