use chrono::NaiveDate;
use opsched_core::model::{
    OperatingException, OperatingRule, OperatingSchedule, RuleKind, RuleType, SchedulePayload,
};
use opsched_core::store::ScheduleStore;
use tempfile::tempdir;

#[test]
fn rules_require_a_saved_schedule() {
    let temp = tempdir().expect("tempdir");
    let store = ScheduleStore::open(temp.path()).expect("open store");

    let err = store
        .add_rule(OperatingRule::weekly(1))
        .expect_err("no schedule yet");
    assert!(err.to_string().contains("save the schedule"));
}

#[test]
fn schedule_rule_and_exception_round_trip() {
    let temp = tempdir().expect("tempdir");
    let store = ScheduleStore::open(temp.path()).expect("open store");

    let created = store
        .upsert_schedule(OperatingSchedule::new("Asia/Singapore", RuleType::Weekly))
        .expect("create schedule");
    let schedule_id = created
        .schedule
        .as_ref()
        .and_then(|s| s.id)
        .expect("schedule id assigned");

    let updated = store
        .upsert_schedule(OperatingSchedule::new("UTC", RuleType::Monthly))
        .expect("replace schedule");
    let schedule = updated.schedule.expect("schedule present");
    assert_eq!(schedule.id, Some(schedule_id));
    assert_eq!(schedule.rule_type, RuleType::Monthly);

    // Fields that do not belong to the rule kind are cleared.
    let mut rule = OperatingRule::monthly_day(15).with_hours("10:00", "");
    rule.weekday = Some(3);
    rule.nth = Some(2);
    let payload = store.add_rule(rule).expect("add rule");
    let stored = &payload.rules[0];
    assert_eq!(stored.kind, RuleKind::MonthlyDay);
    assert_eq!(stored.weekday, None);
    assert_eq!(stored.nth, None);
    assert_eq!(stored.end_time, None);
    let rule_id = stored.id.expect("rule id assigned");

    let holiday = NaiveDate::from_ymd_opt(2026, 12, 25).expect("valid date");
    let payload = store
        .add_exception(OperatingException::closed(holiday))
        .expect("add exception");
    let exception_id = payload.exceptions[0].id.expect("exception id assigned");

    let reopened = ScheduleStore::open(temp.path()).expect("reopen store");
    let loaded = reopened.load().expect("load");
    assert_eq!(loaded.rules.len(), 1);
    assert_eq!(loaded.exceptions[0].date, holiday);

    let payload = reopened.delete_rule(rule_id).expect("delete rule");
    assert!(payload.rules.is_empty());
    let payload = reopened
        .delete_exception(exception_id)
        .expect("delete exception");
    assert!(payload.exceptions.is_empty());

    assert!(reopened.delete_rule(rule_id).is_err());
}

#[test]
fn import_replaces_envelope() {
    let temp = tempdir().expect("tempdir");
    let store = ScheduleStore::open(temp.path()).expect("open store");

    let body: SchedulePayload = serde_json::from_str(
        r#"{
            "schedule": {"timezone": "UTC", "rule_type": "weekly", "is_active": true},
            "rules": [{"rule_type": "weekly", "weekday": 2, "start_time": "09:00", "end_time": "12:00"}],
            "exceptions": []
        }"#,
    )
    .expect("decode body");

    store.import(body.clone()).expect("import");
    assert_eq!(store.load().expect("load"), body);
}
