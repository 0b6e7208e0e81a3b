//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Keep error semantics simple: envelopes carry `ok` plus a message.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every record and scheduling call runs through the core lifecycle
//!   manager; the host only replays the returned [`SchedulerCommand`]s.
//! - Authorization is reported by the host on each call that may schedule.

use crate::host::HostScheduler;
use chrono::{DateTime, Utc};
use log::warn;
use reminder_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    resolve_action, snooze_deadline, ActionId, AuthorizationStatus, Category, Clock, FormError,
    FormSubmission, LifecycleConfig, ManualClock, NotificationForm, NotificationKind,
    NotificationLifecycleManager, NotificationPayload, NotificationRecord, RepeatPolicy,
    SqliteKeyValueStore, SystemClock,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

const RECORD_DB_FILE_NAME: &str = "reminder_records.sqlite3";
const SNOOZE_MINUTES: i64 = 10;
static RECORD_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

type HostManager = NotificationLifecycleManager<HostScheduler, SqliteKeyValueStore>;

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One persisted record as shown in the upcoming list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordItem {
    /// Stored position; pass it back to `record_delete`/`notification_edit`.
    pub position: u32,
    pub id: String,
    pub title: String,
    pub message: String,
    /// Scheduled time in epoch milliseconds (UTC).
    pub date_epoch_ms: i64,
    /// `General|Work|Personal`.
    pub category: String,
    /// `None|Daily|Weekly`.
    pub repeat: String,
    /// `Reminder|Task`.
    pub kind: String,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordListResponse {
    /// Records in stored order (empty when the store is unreadable).
    pub items: Vec<RecordItem>,
    /// Human-readable response message for diagnostics.
    pub message: String,
}

/// One entry of a notification data bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDataEntry {
    pub key: String,
    pub value: String,
}

/// One scheduler call the host must replay on the platform plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerCommand {
    /// `create_channel|create_trigger_notification|display_notification|
    /// cancel_notification|cancel_displayed_notification|increment_badge_count`.
    pub operation: String,
    pub notification_id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub channel_id: Option<String>,
    /// Trigger time in epoch milliseconds (UTC).
    pub timestamp_epoch_ms: Option<i64>,
    /// `daily|weekly` when the trigger repeats.
    pub repeat_frequency: Option<String>,
    pub sound: Option<String>,
    pub press_action: Option<String>,
    pub action_ids: Vec<String>,
    pub action_titles: Vec<String>,
    /// Data bag to attach verbatim; it comes back on press.
    pub data: Vec<NotificationDataEntry>,
}

/// Response envelope for calls that may touch the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCommandResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Id of the affected record, when there is one.
    pub record_id: Option<String>,
    /// `scheduled|permission_denied|suppressed` for scheduling calls,
    /// `ignored|snoozed|dismissed` for presses, empty otherwise.
    pub outcome: String,
    /// Whether the record list write went through.
    pub persisted: bool,
    /// Scheduler calls to replay, in order.
    pub commands: Vec<SchedulerCommand>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl NotificationCommandResponse {
    fn success(message: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            ok: true,
            record_id,
            outcome: String::new(),
            persisted: false,
            commands: Vec::new(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            record_id: None,
            outcome: String::new(),
            persisted: false,
            commands: Vec::new(),
            message: message.into(),
        }
    }

    fn from_submission(
        message: &str,
        result: Result<FormSubmission, FormError>,
        commands: Vec<SchedulerCommand>,
    ) -> Self {
        match result {
            Ok(submission) => Self {
                ok: true,
                record_id: Some(submission.record.id),
                outcome: submission.outcome.as_str().to_string(),
                persisted: submission.persisted,
                commands,
                message: message.to_string(),
            },
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

/// Creates the shared notification channel.
///
/// # FFI contract
/// - Call once at startup and replay the returned `create_channel` command.
#[flutter_rust_bridge::frb(sync)]
pub fn notification_setup() -> NotificationCommandResponse {
    let result = with_manager(
        AuthorizationStatus::NotDetermined,
        Arc::new(SystemClock),
        |manager| async move { manager.bootstrap().await },
    );
    match result {
        Ok((Ok(_), commands)) => NotificationCommandResponse {
            commands,
            ..NotificationCommandResponse::success("Channel ready.", None)
        },
        Ok((Err(err), _)) => NotificationCommandResponse::failure(err.to_string()),
        Err(err) => {
            NotificationCommandResponse::failure(format!("notification_setup failed: {err}"))
        }
    }
}

/// Returns the persisted record list in stored order.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; an unreadable list yields empty `items` and a message.
/// - Stored elements that are not full records are omitted, so `position`
///   may skip numbers.
#[flutter_rust_bridge::frb(sync)]
pub fn records_list() -> RecordListResponse {
    let result = with_manager(
        AuthorizationStatus::NotDetermined,
        Arc::new(SystemClock),
        |manager| async move { manager.list_indexed_records().await },
    );
    match result {
        Ok((records, _)) => RecordListResponse {
            message: format!("{} record(s)", records.len()),
            items: records
                .into_iter()
                .map(|(position, record)| to_record_item(position, record))
                .collect(),
        },
        Err(err) => {
            warn!("event=ffi_records_list module=ffi status=error error={err}");
            RecordListResponse {
                items: Vec::new(),
                message: format!("records_list failed: {err}"),
            }
        }
    }
}

/// Creation flow: validate, schedule under a new id, then persist.
///
/// `category`: `General|Work|Personal`; `kind`: `Reminder|Task`;
/// `repeat`: `None|Daily|Weekly`; `authorization`:
/// `authorized|provisional|denied|not_determined`. Unknown labels fall
/// back to the defaults.
///
/// # FFI contract
/// - Blank title/message returns `ok=false` and no commands.
/// - A denied permission still persists the record; `commands` is empty.
#[flutter_rust_bridge::frb(sync)]
pub fn notification_create(
    title: String,
    message: String,
    date_epoch_ms: i64,
    category: String,
    kind: String,
    repeat: String,
    authorization: String,
) -> NotificationCommandResponse {
    let form = match build_form(title, message, date_epoch_ms, &category, &kind, &repeat) {
        Ok(form) => form,
        Err(err) => {
            return NotificationCommandResponse::failure(format!(
                "notification_create failed: {err}"
            ))
        }
    };
    let result = with_manager(
        parse_authorization(&authorization),
        Arc::new(SystemClock),
        |manager| async move { manager.create_from_form(form).await },
    );
    match result {
        Ok((submission, commands)) => {
            NotificationCommandResponse::from_submission("Record saved.", submission, commands)
        }
        Err(err) => {
            NotificationCommandResponse::failure(format!("notification_create failed: {err}"))
        }
    }
}

/// Edit flow: reschedule under the record's id and replace it in place.
///
/// Labels follow [`notification_create`].
#[flutter_rust_bridge::frb(sync)]
#[allow(clippy::too_many_arguments)]
pub fn notification_edit(
    position: u32,
    title: String,
    message: String,
    date_epoch_ms: i64,
    category: String,
    kind: String,
    repeat: String,
    authorization: String,
) -> NotificationCommandResponse {
    let form = match build_form(title, message, date_epoch_ms, &category, &kind, &repeat) {
        Ok(form) => form,
        Err(err) => {
            return NotificationCommandResponse::failure(format!(
                "notification_edit failed: {err}"
            ))
        }
    };
    let index = position as usize;
    let result = with_manager(
        parse_authorization(&authorization),
        Arc::new(SystemClock),
        |manager| async move { manager.edit_record(index, form).await },
    );
    match result {
        Ok((submission, commands)) => {
            NotificationCommandResponse::from_submission("Record updated.", submission, commands)
        }
        Err(err) => {
            NotificationCommandResponse::failure(format!("notification_edit failed: {err}"))
        }
    }
}

/// Removes the record at `position` from the persisted list only.
///
/// # FFI contract
/// - Any scheduled notification for the record is left alone.
/// - Out-of-range positions return `ok=false` and leave the list unchanged.
#[flutter_rust_bridge::frb(sync)]
pub fn record_delete(position: u32) -> NotificationCommandResponse {
    let index = position as usize;
    let result = with_manager(
        AuthorizationStatus::NotDetermined,
        Arc::new(SystemClock),
        |manager| async move { manager.delete_record(index).await },
    );
    match result {
        Ok((Some(removed), _)) => {
            NotificationCommandResponse::success("Record deleted.", removed.id())
        }
        Ok((None, _)) => NotificationCommandResponse::failure(format!(
            "record_delete failed: no record at position {position}"
        )),
        Err(err) => NotificationCommandResponse::failure(format!("record_delete failed: {err}")),
    }
}

/// Removes the record at `position` and cancels its notification.
#[flutter_rust_bridge::frb(sync)]
pub fn record_discard(position: u32) -> NotificationCommandResponse {
    let index = position as usize;
    let result = with_manager(
        AuthorizationStatus::NotDetermined,
        Arc::new(SystemClock),
        |manager| async move { manager.discard_record(index).await },
    );
    match result {
        Ok((Ok(Some(removed)), commands)) => NotificationCommandResponse {
            commands,
            ..NotificationCommandResponse::success("Record discarded.", removed.id())
        },
        Ok((Ok(None), _)) => NotificationCommandResponse::failure(format!(
            "record_discard failed: no record at position {position}"
        )),
        Ok((Err(err), _)) => NotificationCommandResponse::failure(err.to_string()),
        Err(err) => NotificationCommandResponse::failure(format!("record_discard failed: {err}")),
    }
}

/// Routes one press on a delivered notification.
///
/// `data` is the bag the host attached from a [`SchedulerCommand`];
/// `now_epoch_ms` is the press time snoozing counts from. Foreground,
/// background and cold-start presses all come through here.
#[flutter_rust_bridge::frb(sync)]
pub fn notification_handle_press(
    notification_id: String,
    title: String,
    body: String,
    data: Vec<NotificationDataEntry>,
    action_id: Option<String>,
    now_epoch_ms: i64,
    authorization: String,
) -> NotificationCommandResponse {
    let Some(now) = DateTime::<Utc>::from_timestamp_millis(now_epoch_ms) else {
        return NotificationCommandResponse::failure(format!(
            "notification_handle_press failed: time {now_epoch_ms} is out of range"
        ));
    };
    let record_id = notification_id.clone();
    let mut payload = NotificationPayload::new(
        notification_id,
        title,
        body,
        NotificationKind::default(),
        LifecycleConfig::default().channel.id,
    );
    payload.data = data
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect();
    let action = action_id.as_deref().map(ActionId::parse);

    let result = with_manager(
        parse_authorization(&authorization),
        Arc::new(ManualClock::new(now)),
        |manager| async move {
            manager
                .handle_notification_action(&payload, action.as_ref())
                .await
        },
    );
    match result {
        Ok((Ok(outcome), commands)) => NotificationCommandResponse {
            outcome: outcome.as_str().to_string(),
            commands,
            ..NotificationCommandResponse::success("Press handled.", Some(record_id))
        },
        Ok((Err(err), _)) => NotificationCommandResponse::failure(err.to_string()),
        Err(err) => NotificationCommandResponse::failure(format!(
            "notification_handle_press failed: {err}"
        )),
    }
}

/// Runs the creation-form check. Returns an empty string when valid.
#[flutter_rust_bridge::frb(sync)]
pub fn form_validate(title: String, message: String) -> String {
    let form = NotificationForm {
        title,
        message,
        date: Utc::now(),
        category: Category::default(),
        repeat: RepeatPolicy::default(),
        kind: NotificationKind::default(),
    };
    match form.validate() {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Maps a pressed action id to `ignore|snooze|mark_done`.
#[flutter_rust_bridge::frb(sync)]
pub fn notification_resolve_action(action_id: Option<String>) -> String {
    let action = action_id.as_deref().map(ActionId::parse);
    resolve_action(action.as_ref()).as_str().to_string()
}

/// Returns the snooze delivery time (epoch ms) for a press at `now_epoch_ms`.
///
/// Out-of-range input is returned unchanged.
#[flutter_rust_bridge::frb(sync)]
pub fn notification_snooze_at(now_epoch_ms: i64) -> i64 {
    match DateTime::<Utc>::from_timestamp_millis(now_epoch_ms) {
        Some(now) => snooze_deadline(now, SNOOZE_MINUTES).timestamp_millis(),
        None => now_epoch_ms,
    }
}

fn resolve_record_db_path() -> PathBuf {
    RECORD_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("REMINDER_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(RECORD_DB_FILE_NAME)
        })
        .clone()
}

/// Runs `f` against a manager over the record DB and the host scheduler.
///
/// Returns the value together with the scheduler calls `f` made.
fn with_manager<T, F, Fut>(
    authorization: AuthorizationStatus,
    clock: Arc<dyn Clock>,
    f: F,
) -> Result<(T, Vec<SchedulerCommand>), String>
where
    F: FnOnce(Arc<HostManager>) -> Fut,
    Fut: Future<Output = T>,
{
    let db_path = resolve_record_db_path();
    let store = SqliteKeyValueStore::open(&db_path)
        .map_err(|err| format!("record DB open failed: {err}"))?;
    let scheduler = Arc::new(HostScheduler::new(authorization));
    let manager = Arc::new(NotificationLifecycleManager::new(
        Arc::clone(&scheduler),
        Arc::new(store),
        clock,
        LifecycleConfig::default(),
    ));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|err| format!("runtime init failed: {err}"))?;
    let value = runtime.block_on(f(manager));
    Ok((value, scheduler.take_commands()))
}

fn build_form(
    title: String,
    message: String,
    date_epoch_ms: i64,
    category: &str,
    kind: &str,
    repeat: &str,
) -> Result<NotificationForm, String> {
    let date = DateTime::<Utc>::from_timestamp_millis(date_epoch_ms)
        .ok_or_else(|| format!("date {date_epoch_ms} is out of range"))?;
    Ok(NotificationForm {
        title,
        message,
        date,
        category: parse_category(category),
        repeat: parse_repeat(repeat),
        kind: parse_kind(kind),
    })
}

fn to_record_item(position: usize, record: NotificationRecord) -> RecordItem {
    RecordItem {
        position: u32::try_from(position).unwrap_or(u32::MAX),
        date_epoch_ms: record.scheduled_at.timestamp_millis(),
        category: format!("{:?}", record.category),
        repeat: record.repeat_policy.as_str().to_string(),
        kind: record.kind.as_str().to_string(),
        id: record.id,
        title: record.title,
        message: record.message,
    }
}

fn parse_category(label: &str) -> Category {
    match label.trim() {
        "Work" => Category::Work,
        "Personal" => Category::Personal,
        _ => Category::General,
    }
}

fn parse_kind(label: &str) -> NotificationKind {
    match label.trim() {
        "Task" | "Task Notifications" => NotificationKind::Task,
        _ => NotificationKind::Reminder,
    }
}

fn parse_repeat(label: &str) -> RepeatPolicy {
    match label.trim() {
        "Daily" => RepeatPolicy::Daily,
        "Weekly" => RepeatPolicy::Weekly,
        _ => RepeatPolicy::None,
    }
}

fn parse_authorization(label: &str) -> AuthorizationStatus {
    match label.trim().to_ascii_lowercase().as_str() {
        "authorized" => AuthorizationStatus::Authorized,
        "provisional" => AuthorizationStatus::Provisional,
        "denied" => AuthorizationStatus::Denied,
        _ => AuthorizationStatus::NotDetermined,
    }
}
