//! Notification lifecycle manager.
//!
//! # Responsibility
//! - Gate every scheduling side effect on permission and user settings.
//! - Build triggers/payloads and keep persisted records in step with what
//!   was scheduled.
//! - Route press events (foreground, background, cold start) through one
//!   handler.
//!
//! # Invariants
//! - Screens reach the scheduler only through this manager.
//! - At most one live scheduler entry per record id; relies on the
//!   scheduler's upsert-by-id, not on local locking.
//! - Store failures are logged and swallowed here; scheduler failures
//!   propagate to the caller.
//!
//! # Concurrency
//! - No locks. Same-id schedules race last-writer-wins at the scheduler and
//!   list read-modify-writes can lose updates. Both are accepted.

use crate::model::record::{
    generate_id, Category, NotificationId, NotificationKind, NotificationRecord, RepeatPolicy,
};
use crate::model::settings::NotificationSettings;
use crate::notification::payload::{
    ActionId, ChannelDescriptor, NotificationEvent, NotificationPayload, TimestampTrigger,
};
use crate::notification::scheduler::{NotificationScheduler, SchedulerError, SchedulerResult};
use crate::repo::record_repo::{RecordRepository, StoredRecord, RECORDS_KEY};
use crate::repo::settings_repo::{SettingsRepository, SETTINGS_KEY};
use crate::service::clock::Clock;
use crate::service::routing::{
    resolve_action, snooze_deadline, ActionRoute, DEFAULT_SNOOZE_MINUTES,
};
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Form-level validation message shown by the creation screen.
pub const EMPTY_FIELDS_MESSAGE: &str = "Title and message cannot be empty.";

/// Suffix of the one-shot entry that carries a snoozed repeating series.
pub const SNOOZE_ID_SUFFIX: &str = ":snooze";

/// Manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Shared channel every notification is posted on.
    pub channel: ChannelDescriptor,
    pub snooze_minutes: i64,
    pub records_key: String,
    pub settings_key: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            channel: ChannelDescriptor::default(),
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            records_key: RECORDS_KEY.to_string(),
            settings_key: SETTINGS_KEY.to_string(),
        }
    }
}

/// Input of one scheduling call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub date: DateTime<Utc>,
    pub kind: NotificationKind,
    pub repeat: RepeatPolicy,
}

impl ScheduleRequest {
    /// One-shot request.
    pub fn new(
        id: impl Into<NotificationId>,
        title: impl Into<String>,
        message: impl Into<String>,
        date: DateTime<Utc>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            message: message.into(),
            date,
            kind,
            repeat: RepeatPolicy::None,
        }
    }

    pub fn from_record(record: &NotificationRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            message: record.message.clone(),
            date: record.scheduled_at,
            kind: record.kind,
            repeat: record.repeat_policy,
        }
    }
}

/// Result of a gated scheduling call. Denials are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled,
    /// Authorization below `Authorized`; nothing reached the scheduler.
    PermissionDenied,
    /// Disabled in settings; nothing reached the scheduler.
    Suppressed,
}

impl ScheduleOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::PermissionDenied => "permission_denied",
            Self::Suppressed => "suppressed",
        }
    }
}

/// Result of routing one press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Ignored,
    Snoozed(ScheduleOutcome),
    Dismissed,
}

impl ActionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Snoozed(_) => "snoozed",
            Self::Dismissed => "dismissed",
        }
    }
}

/// Values collected by the creation/edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationForm {
    pub title: String,
    pub message: String,
    pub date: DateTime<Utc>,
    pub category: Category,
    pub repeat: RepeatPolicy,
    pub kind: NotificationKind,
}

impl NotificationForm {
    /// Pre-populates the form from an existing record.
    pub fn from_record(record: &NotificationRecord) -> Self {
        Self {
            title: record.title.clone(),
            message: record.message.clone(),
            date: record.scheduled_at,
            category: record.category,
            repeat: record.repeat_policy,
            kind: record.kind,
        }
    }

    /// Client-side check run before anything is scheduled.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.title.trim().is_empty() || self.message.trim().is_empty() {
            return Err(FormError::EmptyTitleOrMessage);
        }
        Ok(())
    }

    fn into_record(self, id: NotificationId) -> NotificationRecord {
        NotificationRecord {
            id,
            title: self.title.trim().to_string(),
            message: self.message.trim().to_string(),
            scheduled_at: self.date,
            category: self.category,
            repeat_policy: self.repeat,
            kind: self.kind,
        }
    }
}

/// Successful form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub record: NotificationRecord,
    pub outcome: ScheduleOutcome,
    /// `false` when the record list write was dropped.
    pub persisted: bool,
}

/// Creation/edit flow errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    EmptyTitleOrMessage,
    RecordNotFound(usize),
    Scheduler(SchedulerError),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitleOrMessage => write!(f, "{EMPTY_FIELDS_MESSAGE}"),
            Self::RecordNotFound(index) => write!(f, "no notification at position {index}"),
            Self::Scheduler(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FormError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Scheduler(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchedulerError> for FormError {
    fn from(value: SchedulerError) -> Self {
        Self::Scheduler(value)
    }
}

/// Running foreground event pump.
pub struct ForegroundSubscription {
    sender: mpsc::UnboundedSender<NotificationEvent>,
    handle: JoinHandle<()>,
}

impl ForegroundSubscription {
    /// Returns a sender the host forwards foreground events into.
    pub fn sender(&self) -> mpsc::UnboundedSender<NotificationEvent> {
        self.sender.clone()
    }

    /// Drops this handle's sender and waits until queued events drain.
    ///
    /// Returns once every other sender clone is dropped too.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(err) = self.handle.await {
            error!("event=foreground_listener module=lifecycle status=error error={err}");
        }
    }
}

/// Mediates between the record store and the notification scheduler.
///
/// Built once at process start and shared by reference (or `Arc`).
pub struct NotificationLifecycleManager<S: NotificationScheduler, K: KeyValueStore> {
    scheduler: Arc<S>,
    records: RecordRepository<K>,
    settings: SettingsRepository<K>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
}

impl<S: NotificationScheduler, K: KeyValueStore> NotificationLifecycleManager<S, K> {
    /// Builds a manager without touching the scheduler.
    pub fn new(
        scheduler: Arc<S>,
        store: Arc<K>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        let records = RecordRepository::with_key(Arc::clone(&store), config.records_key.clone());
        let settings = SettingsRepository::with_key(store, config.settings_key.clone());
        Self {
            scheduler,
            records,
            settings,
            clock,
            config,
        }
    }

    /// Builds a manager and runs [`Self::bootstrap`].
    pub async fn start(
        scheduler: Arc<S>,
        store: Arc<K>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> SchedulerResult<Self> {
        let manager = Self::new(scheduler, store, clock, config);
        manager.bootstrap().await?;
        Ok(manager)
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Creates the shared channel, then replays the notification that
    /// launched the app (if any) through the live-event handler.
    pub async fn bootstrap(&self) -> SchedulerResult<Option<ActionOutcome>> {
        let channel_id = self.scheduler.create_channel(&self.config.channel).await?;
        info!("event=lifecycle_bootstrap module=lifecycle status=start channel={channel_id}");

        let Some(initial) = self.scheduler.get_initial_notification().await? else {
            info!("event=lifecycle_bootstrap module=lifecycle status=ok cold_start_press=false");
            return Ok(None);
        };

        info!(
            "event=lifecycle_bootstrap module=lifecycle status=ok cold_start_press=true id={}",
            initial.notification.id
        );
        let outcome = self
            .handle_notification_action(&initial.notification, initial.press_action.as_ref())
            .await?;
        Ok(Some(outcome))
    }

    /// Requests authorization; granted iff at or above `Authorized`.
    pub async fn check_permissions(&self) -> SchedulerResult<bool> {
        let status = self.scheduler.request_permission().await?;
        let granted = status.is_granted();
        debug!("event=permission_check module=lifecycle status=ok granted={granted} level={status:?}");
        Ok(granted)
    }

    /// Schedules (or reschedules, same id) one timestamp notification.
    ///
    /// Returns `PermissionDenied`/`Suppressed` without calling the scheduler
    /// when gated. A past `date` is passed through unchanged.
    pub async fn schedule_notification(
        &self,
        request: &ScheduleRequest,
    ) -> SchedulerResult<ScheduleOutcome> {
        if !self.check_permissions().await? {
            info!(
                "event=notification_schedule module=lifecycle status=skipped reason=permission_denied id={}",
                request.id
            );
            return Ok(ScheduleOutcome::PermissionDenied);
        }

        let settings = self.settings().await;
        if !settings.allows(request.kind) {
            info!(
                "event=notification_schedule module=lifecycle status=skipped reason=disabled_in_settings id={} kind={}",
                request.id,
                request.kind.as_str()
            );
            return Ok(ScheduleOutcome::Suppressed);
        }

        let payload = self.build_payload(request, &settings);
        let trigger = TimestampTrigger::repeating(request.date, request.repeat);
        self.scheduler
            .create_trigger_notification(&payload, &trigger)
            .await?;

        info!(
            "event=notification_schedule module=lifecycle status=ok id={} kind={} at={} repeat={:?}",
            request.id,
            request.kind.as_str(),
            request.date.to_rfc3339(),
            request.repeat
        );
        Ok(ScheduleOutcome::Scheduled)
    }

    /// Displays a notification immediately and bumps the badge.
    pub async fn present_now(&self, request: &ScheduleRequest) -> SchedulerResult<ScheduleOutcome> {
        if !self.check_permissions().await? {
            return Ok(ScheduleOutcome::PermissionDenied);
        }
        let settings = self.settings().await;
        if !settings.allows(request.kind) {
            return Ok(ScheduleOutcome::Suppressed);
        }

        let payload = self.build_payload(request, &settings);
        self.scheduler.display_notification(&payload).await?;
        self.scheduler.increment_badge_count().await?;
        info!(
            "event=notification_present module=lifecycle status=ok id={}",
            request.id
        );
        Ok(ScheduleOutcome::Scheduled)
    }

    /// Re-issues `notification` `snooze_minutes` from now, then cancels the
    /// delivered instance.
    ///
    /// One-shot notifications are re-armed under the same id and the record
    /// date moves with them. A repeating series keeps its trigger and record;
    /// the snooze becomes a separate one-shot entry under
    /// `<id>` + [`SNOOZE_ID_SUFFIX`].
    ///
    /// The cancel runs regardless of the schedule outcome. A failed cancel
    /// after a successful reschedule is not rolled back.
    pub async fn snooze_notification(
        &self,
        notification: &NotificationPayload,
    ) -> SchedulerResult<ScheduleOutcome> {
        let (kind, repeat) = match notification.decode_data() {
            Ok(data) => (data.kind, data.repeat),
            Err(err) => {
                // Only reminders carry a snooze button.
                warn!(
                    "event=notification_snooze module=lifecycle status=degraded id={} error={}",
                    notification.id, err
                );
                (NotificationKind::Reminder, RepeatPolicy::None)
            }
        };
        let series = repeat.is_repeating();
        let snooze_id = if series {
            format!("{}{SNOOZE_ID_SUFFIX}", notification.id)
        } else {
            notification.id.clone()
        };
        let new_time = snooze_deadline(self.clock.now(), self.config.snooze_minutes);
        let request = ScheduleRequest::new(
            snooze_id.clone(),
            notification.title.clone(),
            notification.body.clone(),
            new_time,
            kind,
        );

        let outcome = self.schedule_notification(&request).await?;
        self.scheduler
            .cancel_displayed_notification(&notification.id)
            .await?;

        if outcome == ScheduleOutcome::Scheduled && !series {
            match self
                .records
                .update_by_id(&notification.id, |record| record.scheduled_at = new_time)
                .await
            {
                Ok(updated) => debug!(
                    "event=record_reschedule module=lifecycle status=ok id={} updated={updated}",
                    notification.id
                ),
                Err(err) => error!(
                    "event=record_reschedule module=lifecycle status=error id={} error={err}",
                    notification.id
                ),
            }
        }

        info!(
            "event=notification_snooze module=lifecycle status=ok id={} snooze_id={snooze_id} outcome={outcome:?} at={}",
            notification.id,
            new_time.to_rfc3339()
        );
        Ok(outcome)
    }

    /// Cancels the pending and displayed instances of `id`.
    pub async fn cancel_notification(&self, id: &str) -> SchedulerResult<()> {
        self.scheduler.cancel_notification(id).await?;
        info!("event=notification_cancel module=lifecycle status=ok id={id}");
        Ok(())
    }

    /// Applies the routed outcome of one press.
    pub async fn handle_notification_action(
        &self,
        notification: &NotificationPayload,
        action: Option<&ActionId>,
    ) -> SchedulerResult<ActionOutcome> {
        let route = resolve_action(action);
        debug!(
            "event=notification_action module=lifecycle status=start id={} action={} route={}",
            notification.id,
            action.map_or("none", ActionId::as_str),
            route.as_str()
        );

        match route {
            ActionRoute::Ignore => Ok(ActionOutcome::Ignored),
            ActionRoute::Snooze => {
                let outcome = self.snooze_notification(notification).await?;
                Ok(ActionOutcome::Snoozed(outcome))
            }
            ActionRoute::MarkDone => {
                self.cancel_notification(&notification.id).await?;
                if let Err(err) = self.records.remove_by_id(&notification.id).await {
                    error!(
                        "event=record_remove module=lifecycle status=error id={} error={err}",
                        notification.id
                    );
                }
                Ok(ActionOutcome::Dismissed)
            }
        }
    }

    /// Routes one scheduler event. Non-press events yield `None`.
    pub async fn handle_event(
        &self,
        event: &NotificationEvent,
    ) -> SchedulerResult<Option<ActionOutcome>> {
        if !event.is_press() {
            debug!(
                "event=notification_event module=lifecycle status=skipped kind={:?}",
                event.kind
            );
            return Ok(None);
        }
        let Some(notification) = event.notification.as_ref() else {
            return Ok(None);
        };
        let outcome = self
            .handle_notification_action(notification, event.press_action.as_ref())
            .await?;
        Ok(Some(outcome))
    }

    /// Returns the persisted list; unreadable state reads as empty.
    ///
    /// Elements that do not decode as a record are skipped.
    pub async fn list_records(&self) -> Vec<NotificationRecord> {
        self.list_indexed_records()
            .await
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    /// Like [`Self::list_records`], paired with each record's stored
    /// position, which is what the index-addressed operations take.
    pub async fn list_indexed_records(&self) -> Vec<(usize, NotificationRecord)> {
        match self.records.load_indexed().await {
            Ok(records) => records,
            Err(err) => {
                error!("event=record_list module=lifecycle status=error error={err}");
                Vec::new()
            }
        }
    }

    /// Appends `record` to the persisted list. Returns `false` when dropped.
    pub async fn save_record(&self, record: &NotificationRecord) -> bool {
        match self.records.append(record).await {
            Ok(()) => {
                info!(
                    "event=record_save module=lifecycle status=ok id={}",
                    record.id
                );
                true
            }
            Err(err) => {
                error!(
                    "event=record_save module=lifecycle status=error id={} error={err}",
                    record.id
                );
                false
            }
        }
    }

    /// Removes the record at `index` from the list only.
    ///
    /// The live scheduler entry for that record is left alone; use
    /// [`Self::discard_record`] to cancel it too.
    pub async fn delete_record(&self, index: usize) -> Option<StoredRecord> {
        match self.records.remove_at(index).await {
            Ok(removed) => {
                info!(
                    "event=record_delete module=lifecycle status=ok index={index} id={}",
                    removed.id().as_deref().unwrap_or("none")
                );
                Some(removed)
            }
            Err(err) => {
                warn!("event=record_delete module=lifecycle status=error index={index} error={err}");
                None
            }
        }
    }

    /// Removes the record at `index` and cancels its scheduler entry.
    ///
    /// An element without an id has no entry to cancel.
    pub async fn discard_record(&self, index: usize) -> SchedulerResult<Option<StoredRecord>> {
        let Some(removed) = self.delete_record(index).await else {
            return Ok(None);
        };
        if let Some(id) = removed.id() {
            self.cancel_notification(&id).await?;
        }
        Ok(Some(removed))
    }

    /// Creation flow: validate, schedule under a new id, append.
    pub async fn create_from_form(
        &self,
        form: NotificationForm,
    ) -> Result<FormSubmission, FormError> {
        form.validate()?;
        let record = form.into_record(generate_id());
        let outcome = self
            .schedule_notification(&ScheduleRequest::from_record(&record))
            .await?;
        let persisted = self.save_record(&record).await;
        Ok(FormSubmission {
            record,
            outcome,
            persisted,
        })
    }

    /// Edit flow: reschedule under the original id and replace in place.
    ///
    /// A stored element without an id is given a fresh one.
    pub async fn edit_record(
        &self,
        index: usize,
        form: NotificationForm,
    ) -> Result<FormSubmission, FormError> {
        form.validate()?;
        let existing = match self.records.entry_at(index).await {
            Ok(entry) => entry,
            Err(err) => {
                error!("event=record_edit module=lifecycle status=error index={index} error={err}");
                None
            }
        }
        .ok_or(FormError::RecordNotFound(index))?;

        let id = existing.id().unwrap_or_else(generate_id);
        let record = form.into_record(id);
        let outcome = self
            .schedule_notification(&ScheduleRequest::from_record(&record))
            .await?;
        let persisted = match self.records.replace_at(index, &record).await {
            Ok(()) => {
                info!(
                    "event=record_edit module=lifecycle status=ok index={index} id={}",
                    record.id
                );
                true
            }
            Err(err) => {
                error!(
                    "event=record_edit module=lifecycle status=error index={index} id={} error={err}",
                    record.id
                );
                false
            }
        };
        Ok(FormSubmission {
            record,
            outcome,
            persisted,
        })
    }

    /// Returns persisted settings; unreadable state reads as defaults.
    pub async fn settings(&self) -> NotificationSettings {
        match self.settings.load().await {
            Ok(settings) => settings,
            Err(err) => {
                error!("event=settings_load module=lifecycle status=error error={err}");
                NotificationSettings::default()
            }
        }
    }

    /// Persists `settings`. Returns `false` when the write was dropped.
    pub async fn update_settings(&self, settings: &NotificationSettings) -> bool {
        match self.settings.save(settings).await {
            Ok(()) => true,
            Err(err) => {
                error!("event=settings_save module=lifecycle status=error error={err}");
                false
            }
        }
    }

    fn build_payload(
        &self,
        request: &ScheduleRequest,
        settings: &NotificationSettings,
    ) -> NotificationPayload {
        let mut payload = NotificationPayload::new(
            request.id.clone(),
            request.title.clone(),
            request.message.clone(),
            request.kind,
            self.config.channel.id.clone(),
        )
        .with_repeat(request.repeat);
        payload.sound = Some(settings.sound.as_str().to_string());
        payload
    }
}

impl<S, K> NotificationLifecycleManager<S, K>
where
    S: NotificationScheduler + 'static,
    K: KeyValueStore + 'static,
{
    /// Spawns the foreground event pump on the current tokio runtime.
    ///
    /// Handler failures are logged; the pump keeps running until every
    /// sender is dropped.
    pub fn subscribe_foreground(self: &Arc<Self>) -> ForegroundSubscription {
        let (sender, mut receiver) = mpsc::unbounded_channel::<NotificationEvent>();
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(err) = manager.handle_event(&event).await {
                    error!(
                        "event=foreground_event module=lifecycle status=error kind={:?} error={err}",
                        event.kind
                    );
                }
            }
            debug!("event=foreground_listener module=lifecycle status=closed");
        });
        ForegroundSubscription { sender, handle }
    }
}

/// Entry point for events delivered while the app is not running.
///
/// Builds a fresh manager from the given handles, so nothing from a prior
/// session is visible; only the event payload and persisted state are.
pub async fn handle_background_event<S, K>(
    scheduler: Arc<S>,
    store: Arc<K>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
    event: NotificationEvent,
) -> SchedulerResult<Option<ActionOutcome>>
where
    S: NotificationScheduler,
    K: KeyValueStore,
{
    let manager = NotificationLifecycleManager::new(scheduler, store, clock, config);
    manager.handle_event(&event).await
}
