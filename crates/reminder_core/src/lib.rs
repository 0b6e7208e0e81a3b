//! Core domain logic for the reminder app.
//! This crate owns the link between persisted notification records and the
//! entries live in the platform scheduler.

pub mod db;
pub mod logging;
pub mod model;
pub mod notification;
pub mod repo;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::record::{
    parse_stored_date, Category, NotificationId, NotificationKind, NotificationRecord,
    RecordValidationError, RepeatPolicy,
};
pub use model::settings::{NotificationSettings, NotificationSound};
pub use notification::memory::{EntryState, InMemoryScheduler, LiveEntry};
pub use notification::payload::{
    ActionId, AuthorizationStatus, ChannelDescriptor, EventType, InitialNotification,
    NotificationAction, NotificationData, NotificationEvent, NotificationPayload,
    PayloadDecodeError, RepeatFrequency, TimestampTrigger,
};
pub use notification::scheduler::{
    NotificationScheduler, SchedulerError, SchedulerOperation, SchedulerResult,
};
pub use repo::record_repo::{RecordRepository, StoredRecord};
pub use repo::settings_repo::SettingsRepository;
pub use repo::{RepoError, RepoResult};
pub use service::clock::{Clock, ManualClock, SystemClock};
pub use service::lifecycle::{
    handle_background_event, ActionOutcome, FormError, FormSubmission, ForegroundSubscription,
    LifecycleConfig, NotificationForm, NotificationLifecycleManager, ScheduleOutcome,
    ScheduleRequest, EMPTY_FIELDS_MESSAGE, SNOOZE_ID_SUFFIX,
};
pub use service::routing::{resolve_action, snooze_deadline, ActionRoute};
pub use store::{
    InMemoryKeyValueStore, KeyValueStore, SqliteKeyValueStore, StoreError, StoreResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
