use chrono::{DateTime, Duration, TimeZone, Utc};
use reminder_core::{
    handle_background_event, ActionId, ActionOutcome, AuthorizationStatus, EntryState,
    InMemoryKeyValueStore, InMemoryScheduler, InitialNotification, LifecycleConfig, ManualClock,
    NotificationEvent, NotificationKind, NotificationLifecycleManager, NotificationPayload,
    NotificationRecord, NotificationSettings, RepeatFrequency, RepeatPolicy, ScheduleOutcome,
    ScheduleRequest, SchedulerOperation, SNOOZE_ID_SUFFIX,
};
use std::collections::BTreeMap;
use std::sync::Arc;

type Manager = NotificationLifecycleManager<InMemoryScheduler, InMemoryKeyValueStore>;

struct Harness {
    scheduler: Arc<InMemoryScheduler>,
    store: Arc<InMemoryKeyValueStore>,
    clock: Arc<ManualClock>,
    manager: Manager,
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap()
}

fn harness_with(authorization: AuthorizationStatus) -> Harness {
    let scheduler = Arc::new(InMemoryScheduler::with_authorization(authorization));
    let store = Arc::new(InMemoryKeyValueStore::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let manager = NotificationLifecycleManager::new(
        Arc::clone(&scheduler),
        Arc::clone(&store),
        clock.clone(),
        LifecycleConfig::default(),
    );
    Harness {
        scheduler,
        store,
        clock,
        manager,
    }
}

fn harness() -> Harness {
    harness_with(AuthorizationStatus::Authorized)
}

fn pay_rent(at: DateTime<Utc>) -> ScheduleRequest {
    ScheduleRequest::new("1", "Pay rent", "Due today", at, NotificationKind::Reminder)
}

/// Schedules `request`, lets it fire, and returns the delivered payload.
async fn deliver(h: &Harness, request: &ScheduleRequest) -> NotificationPayload {
    let outcome = h.manager.schedule_notification(request).await.unwrap();
    assert_eq!(outcome, ScheduleOutcome::Scheduled);
    let delivered = h.scheduler.deliver_due(request.date);
    delivered
        .into_iter()
        .find(|payload| payload.id == request.id)
        .expect("scheduled notification should be delivered")
}

#[tokio::test]
async fn schedule_attaches_type_specific_actions_and_data() {
    let h = harness();
    let at = base_time() + Duration::hours(1);

    h.manager.schedule_notification(&pay_rent(at)).await.unwrap();
    h.manager
        .schedule_notification(&ScheduleRequest::new(
            "2",
            "Review PR",
            "Before lunch",
            at,
            NotificationKind::Task,
        ))
        .await
        .unwrap();

    let reminder = h.scheduler.live_entry("1").unwrap();
    assert_eq!(reminder.trigger.unwrap().timestamp, at);
    assert_eq!(reminder.payload.channel_id, "default");
    assert_eq!(reminder.payload.body, "Due today");
    let reminder_actions: Vec<_> = reminder
        .payload
        .actions
        .iter()
        .map(|action| action.action_id.clone())
        .collect();
    assert_eq!(reminder_actions, vec![ActionId::Snooze, ActionId::MarkDone]);
    assert_eq!(
        reminder.payload.data,
        BTreeMap::from([
            ("id".to_string(), "1".to_string()),
            ("type".to_string(), "Reminder".to_string())
        ])
    );

    let task = h.scheduler.live_entry("2").unwrap();
    let task_actions: Vec<_> = task
        .payload
        .actions
        .iter()
        .map(|action| action.action_id.clone())
        .collect();
    assert_eq!(task_actions, vec![ActionId::Accept, ActionId::Decline]);
}

#[tokio::test]
async fn scheduling_same_id_twice_keeps_one_entry_at_later_date() {
    let h = harness();
    let first = base_time() + Duration::hours(1);
    let second = base_time() + Duration::hours(3);

    h.manager.schedule_notification(&pay_rent(first)).await.unwrap();
    h.manager
        .schedule_notification(&pay_rent(second))
        .await
        .unwrap();

    assert_eq!(h.scheduler.live_ids(), vec!["1".to_string()]);
    assert_eq!(
        h.scheduler.live_entry("1").unwrap().trigger.unwrap().timestamp,
        second
    );
}

#[tokio::test]
async fn permission_denied_makes_no_scheduler_call_and_no_error() {
    for status in [
        AuthorizationStatus::Denied,
        AuthorizationStatus::NotDetermined,
    ] {
        let h = harness_with(status);
        let outcome = h
            .manager
            .schedule_notification(&pay_rent(base_time()))
            .await
            .expect("denied permission must not be an error");

        assert_eq!(outcome, ScheduleOutcome::PermissionDenied);
        assert_eq!(h.scheduler.calls(), vec![SchedulerOperation::RequestPermission]);
        assert_eq!(h.scheduler.live_count(), 0);
    }
}

#[tokio::test]
async fn provisional_authorization_counts_as_granted() {
    let h = harness_with(AuthorizationStatus::Provisional);
    assert!(h.manager.check_permissions().await.unwrap());
}

#[tokio::test]
async fn disabled_settings_suppress_scheduling() {
    let h = harness();
    let settings = NotificationSettings {
        reminders_enabled: false,
        ..NotificationSettings::default()
    };
    assert!(h.manager.update_settings(&settings).await);

    let outcome = h
        .manager
        .schedule_notification(&pay_rent(base_time()))
        .await
        .unwrap();
    assert_eq!(outcome, ScheduleOutcome::Suppressed);
    assert_eq!(
        h.scheduler
            .call_count(SchedulerOperation::CreateTriggerNotification),
        0
    );
}

#[tokio::test]
async fn mark_done_leaves_no_live_entry_and_drops_record() {
    for kind in [NotificationKind::Reminder, NotificationKind::Task] {
        let h = harness();
        let at = base_time() + Duration::minutes(30);
        let request = ScheduleRequest::new("42", "Water plants", "Balcony", at, kind);
        h.manager
            .save_record(&NotificationRecord::with_id(
                "42",
                "Water plants",
                "Balcony",
                at,
                kind,
            ))
            .await;
        let delivered = deliver(&h, &request).await;

        let outcome = h
            .manager
            .handle_event(&NotificationEvent::press(
                delivered,
                Some(ActionId::MarkDone),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, Some(ActionOutcome::Dismissed));
        assert!(h.scheduler.live_entry("42").is_none());
        assert!(h.manager.list_records().await.is_empty());
    }
}

#[tokio::test]
async fn snooze_scenario_reschedules_same_id_fifteen_minutes_after_original() {
    let h = harness();
    let t = base_time();
    let delivered = deliver(&h, &pay_rent(t)).await;
    assert_eq!(
        h.scheduler.live_entry("1").unwrap().state,
        EntryState::Displayed
    );

    h.clock.set(t + Duration::minutes(5));
    let outcome = h
        .manager
        .handle_event(&NotificationEvent::press(delivered, Some(ActionId::Snooze)))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Some(ActionOutcome::Snoozed(ScheduleOutcome::Scheduled))
    );
    assert_eq!(h.scheduler.live_count(), 1);
    let entry = h.scheduler.live_entry("1").unwrap();
    assert_eq!(entry.state, EntryState::Pending);
    assert_eq!(entry.payload.title, "Pay rent");
    assert_eq!(entry.payload.body, "Due today");
    assert_eq!(entry.trigger.unwrap().timestamp, t + Duration::minutes(15));
    assert_eq!(
        entry.payload.decode_data().unwrap().kind,
        NotificationKind::Reminder
    );
}

#[tokio::test]
async fn snooze_preserves_task_type_and_updates_record_in_place() {
    let h = harness();
    let t = base_time();
    for (id, title) in [("a", "First"), ("b", "Second"), ("c", "Third")] {
        h.manager
            .save_record(&NotificationRecord::with_id(
                id,
                title,
                "msg",
                t,
                NotificationKind::Task,
            ))
            .await;
    }
    let delivered = deliver(
        &h,
        &ScheduleRequest::new("b", "Second", "msg", t, NotificationKind::Task),
    )
    .await;

    h.manager.snooze_notification(&delivered).await.unwrap();

    let entry = h.scheduler.live_entry("b").unwrap();
    assert_eq!(
        entry.payload.decode_data().unwrap().kind,
        NotificationKind::Task
    );
    let records = h.manager.list_records().await;
    let ids: Vec<_> = records.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(records[1].scheduled_at, t + Duration::minutes(10));
    assert_eq!(records[0].scheduled_at, t);
}

#[tokio::test]
async fn snoozing_daily_reminder_keeps_series_and_adds_one_shot() {
    let h = harness();
    let t = base_time();
    let mut request = pay_rent(t);
    request.repeat = RepeatPolicy::Daily;
    let mut record = NotificationRecord::with_id("1", "Pay rent", "Due today", t, request.kind);
    record.repeat_policy = RepeatPolicy::Daily;
    h.manager.save_record(&record).await;
    let delivered = deliver(&h, &request).await;

    h.clock.set(t + Duration::minutes(2));
    let outcome = h
        .manager
        .handle_event(&NotificationEvent::press(delivered, Some(ActionId::Snooze)))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Some(ActionOutcome::Snoozed(ScheduleOutcome::Scheduled))
    );
    let series = h.scheduler.live_entry("1").unwrap();
    assert_eq!(series.state, EntryState::Pending);
    let series_trigger = series.trigger.unwrap();
    assert_eq!(series_trigger.timestamp, t + Duration::days(1));
    assert_eq!(series_trigger.repeat_frequency, Some(RepeatFrequency::Daily));

    let snooze_id = format!("1{SNOOZE_ID_SUFFIX}");
    let snoozed = h.scheduler.live_entry(&snooze_id).unwrap();
    let snoozed_trigger = snoozed.trigger.unwrap();
    assert_eq!(snoozed_trigger.timestamp, t + Duration::minutes(12));
    assert_eq!(snoozed_trigger.repeat_frequency, None);
    assert_eq!(snoozed.payload.title, "Pay rent");
    assert_eq!(h.scheduler.live_count(), 2);

    let records = h.manager.list_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].scheduled_at, t);
    assert_eq!(records[0].repeat_policy, RepeatPolicy::Daily);
}

#[tokio::test]
async fn snooze_with_undecodable_data_falls_back_to_reminder() {
    let h = harness();
    let mut payload =
        NotificationPayload::new("x", "Stretch", "Stand up", NotificationKind::Task, "default");
    payload.data.clear();

    h.manager.snooze_notification(&payload).await.unwrap();

    let entry = h.scheduler.live_entry("x").unwrap();
    assert_eq!(
        entry.payload.decode_data().unwrap().kind,
        NotificationKind::Reminder
    );
}

#[tokio::test]
async fn snooze_reschedule_failure_propagates_and_keeps_original() {
    let h = harness();
    let delivered = deliver(&h, &pay_rent(base_time())).await;
    h.scheduler
        .fail_next(SchedulerOperation::CreateTriggerNotification);

    let err = h
        .manager
        .snooze_notification(&delivered)
        .await
        .expect_err("scheduler failure should propagate");

    assert_eq!(err.operation, SchedulerOperation::CreateTriggerNotification);
    assert_eq!(h.scheduler.call_count(SchedulerOperation::CancelDisplayedNotification), 0);
    assert_eq!(
        h.scheduler.live_entry("1").unwrap().state,
        EntryState::Displayed
    );
}

#[tokio::test]
async fn snooze_cancel_failure_is_not_rolled_back() {
    let h = harness();
    let delivered = deliver(&h, &pay_rent(base_time())).await;
    h.scheduler
        .fail_next(SchedulerOperation::CancelDisplayedNotification);

    assert!(h.manager.snooze_notification(&delivered).await.is_err());
    let entry = h.scheduler.live_entry("1").unwrap();
    assert_eq!(entry.state, EntryState::Pending);
    assert_eq!(
        entry.trigger.unwrap().timestamp,
        base_time() + Duration::minutes(10)
    );
}

#[tokio::test]
async fn body_press_task_buttons_and_unknown_actions_are_ignored() {
    let h = harness();
    let delivered = deliver(&h, &pay_rent(base_time())).await;
    let calls_before = h.scheduler.calls().len();

    for action in [
        None,
        Some(ActionId::Default),
        Some(ActionId::Accept),
        Some(ActionId::Decline),
        Some(ActionId::parse("archive")),
    ] {
        let outcome = h
            .manager
            .handle_event(&NotificationEvent::press(delivered.clone(), action))
            .await
            .unwrap();
        assert_eq!(outcome, Some(ActionOutcome::Ignored));
    }

    assert_eq!(h.scheduler.calls().len(), calls_before);
    assert_eq!(h.scheduler.live_count(), 1);
}

#[tokio::test]
async fn non_press_events_are_not_routed() {
    let h = harness();
    let delivered = deliver(&h, &pay_rent(base_time())).await;
    let mut event = NotificationEvent::press(delivered, Some(ActionId::MarkDone));
    event.kind = reminder_core::EventType::Dismissed;

    assert_eq!(h.manager.handle_event(&event).await.unwrap(), None);
    assert_eq!(h.scheduler.live_count(), 1);
}

#[tokio::test]
async fn bootstrap_creates_channel_and_replays_cold_start_press() {
    let h = harness();
    let delivered = deliver(&h, &pay_rent(base_time())).await;
    h.scheduler.set_initial_notification(Some(InitialNotification {
        notification: delivered,
        press_action: Some(ActionId::MarkDone),
    }));

    let outcome = h.manager.bootstrap().await.unwrap();

    assert_eq!(outcome, Some(ActionOutcome::Dismissed));
    assert!(h.scheduler.channel("default").is_some());
    assert_eq!(h.scheduler.live_count(), 0);
}

#[tokio::test]
async fn start_without_initial_notification_is_quiet() {
    let scheduler = Arc::new(InMemoryScheduler::new());
    let store = Arc::new(InMemoryKeyValueStore::new());
    let clock = Arc::new(ManualClock::new(base_time()));

    let manager =
        NotificationLifecycleManager::start(scheduler.clone(), store, clock, LifecycleConfig::default())
            .await
            .unwrap();

    assert_eq!(
        scheduler.calls(),
        vec![
            SchedulerOperation::CreateChannel,
            SchedulerOperation::GetInitialNotification
        ]
    );
    assert_eq!(manager.config().snooze_minutes, 10);
}

#[tokio::test]
async fn background_event_uses_same_routing_with_fresh_state() {
    let h = harness();
    let delivered = deliver(&h, &pay_rent(base_time())).await;
    h.clock.set(base_time() + Duration::minutes(2));

    let outcome = handle_background_event(
        Arc::clone(&h.scheduler),
        Arc::clone(&h.store),
        h.clock.clone(),
        LifecycleConfig::default(),
        NotificationEvent::press(delivered, Some(ActionId::Snooze)),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        Some(ActionOutcome::Snoozed(ScheduleOutcome::Scheduled))
    );
    assert_eq!(
        h.scheduler.live_entry("1").unwrap().trigger.unwrap().timestamp,
        base_time() + Duration::minutes(12)
    );
}

#[tokio::test]
async fn foreground_subscription_drains_events_in_order() {
    let h = harness();
    let delivered = deliver(&h, &pay_rent(base_time())).await;
    let manager = Arc::new(h.manager);

    let subscription = manager.subscribe_foreground();
    let sender = subscription.sender();
    sender
        .send(NotificationEvent::press(
            delivered.clone(),
            Some(ActionId::Snooze),
        ))
        .unwrap();
    sender
        .send(NotificationEvent::press(delivered, Some(ActionId::MarkDone)))
        .unwrap();
    drop(sender);
    subscription.shutdown().await;

    assert_eq!(h.scheduler.live_count(), 0);
    assert_eq!(
        h.scheduler.call_count(SchedulerOperation::CancelNotification),
        1
    );
}

#[tokio::test]
async fn present_now_displays_and_bumps_badge() {
    let h = harness();
    let outcome = h
        .manager
        .present_now(&pay_rent(base_time()))
        .await
        .unwrap();

    assert_eq!(outcome, ScheduleOutcome::Scheduled);
    assert_eq!(h.scheduler.badge_count(), 1);
    let entry = h.scheduler.live_entry("1").unwrap();
    assert_eq!(entry.state, EntryState::Displayed);
    assert_eq!(entry.payload.sound.as_deref(), Some("default"));
}
