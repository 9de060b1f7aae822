//! Wire shapes of the operating-schedule API.
//!
//! These mirror the JSON envelope served by
//! `GET /api/services/{id}/operating-schedule` so a response body can be
//! stored and read back without translation. Times stay as the strings
//! the API sends; they are validated when a schedule is compiled.

use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use uuid::Uuid;

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
  Daily,
  Weekly,
  Monthly
}

impl std::fmt::Display for RuleType {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>
  ) -> std::fmt::Result {
    let name = match self {
      | Self::Daily => "daily",
      | Self::Weekly => "weekly",
      | Self::Monthly => "monthly"
    };
    f.write_str(name)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
  Weekly,
  MonthlyDay,
  MonthlyNthWeekday
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct OperatingSchedule {
  #[serde(default)]
  pub id:             Option<Uuid>,
  #[serde(default)]
  pub service_id:     Option<String>,
  #[serde(default)]
  pub timezone:       String,
  pub rule_type:      RuleType,
  #[serde(default)]
  pub open_time:      Option<String>,
  #[serde(default)]
  pub close_time:     Option<String>,
  #[serde(default)]
  pub effective_from: Option<NaiveDate>,
  #[serde(default)]
  pub effective_to:   Option<NaiveDate>,
  #[serde(default = "default_active")]
  pub is_active:      bool
}

fn default_active() -> bool {
  true
}

impl OperatingSchedule {
  /// An active, unbounded schedule with no default hours.
  pub fn new(
    timezone: impl Into<String>,
    rule_type: RuleType
  ) -> Self {
    Self {
      id: None,
      service_id: None,
      timezone: timezone.into(),
      rule_type,
      open_time: None,
      close_time: None,
      effective_from: None,
      effective_to: None,
      is_active: true
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct OperatingRule {
  #[serde(default)]
  pub id:         Option<Uuid>,
  #[serde(rename = "rule_type")]
  pub kind:       RuleKind,
  #[serde(default)]
  pub weekday:    Option<i32>,
  #[serde(default)]
  pub month_day:  Option<i32>,
  #[serde(default)]
  pub nth:        Option<i32>,
  #[serde(default)]
  pub start_time: Option<String>,
  #[serde(default)]
  pub end_time:   Option<String>
}

impl OperatingRule {
  pub fn weekly(weekday: i32) -> Self {
    Self::bare(RuleKind::Weekly)
      .with_weekday(weekday)
  }

  pub fn monthly_day(day: i32) -> Self {
    let mut rule =
      Self::bare(RuleKind::MonthlyDay);
    rule.month_day = Some(day);
    rule
  }

  pub fn monthly_nth_weekday(
    nth: i32,
    weekday: i32
  ) -> Self {
    let mut rule = Self::bare(
      RuleKind::MonthlyNthWeekday
    )
    .with_weekday(weekday);
    rule.nth = Some(nth);
    rule
  }

  pub fn with_hours(
    mut self,
    start: &str,
    end: &str
  ) -> Self {
    self.start_time =
      Some(start.to_string());
    self.end_time = Some(end.to_string());
    self
  }

  fn with_weekday(
    mut self,
    weekday: i32
  ) -> Self {
    self.weekday = Some(weekday);
    self
  }

  fn bare(kind: RuleKind) -> Self {
    Self {
      id: None,
      kind,
      weekday: None,
      month_day: None,
      nth: None,
      start_time: None,
      end_time: None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct OperatingException {
  #[serde(default)]
  pub id:         Option<Uuid>,
  #[serde(default)]
  pub service_id: Option<String>,
  pub date:       NaiveDate,
  #[serde(default)]
  pub is_open:    bool,
  #[serde(default)]
  pub start_time: Option<String>,
  #[serde(default)]
  pub end_time:   Option<String>,
  #[serde(default)]
  pub reason:     Option<String>
}

impl OperatingException {
  pub fn closed(date: NaiveDate) -> Self {
    Self {
      id: None,
      service_id: None,
      date,
      is_open: false,
      start_time: None,
      end_time: None,
      reason: None
    }
  }

  pub fn open(date: NaiveDate) -> Self {
    Self {
      is_open: true,
      ..Self::closed(date)
    }
  }

  pub fn with_hours(
    mut self,
    start: &str,
    end: &str
  ) -> Self {
    self.start_time =
      Some(start.to_string());
    self.end_time = Some(end.to_string());
    self
  }
}

/// The envelope every schedule endpoint returns.
#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct SchedulePayload {
  #[serde(default)]
  pub schedule:   Option<OperatingSchedule>,
  #[serde(default)]
  pub rules:      Vec<OperatingRule>,
  #[serde(default)]
  pub exceptions: Vec<OperatingException>
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_api_envelope() {
    let raw = r#"{
      "schedule": {
        "id": "6f1c7a3e-8d0e-4a51-9d3c-0a5f1e2b3c4d",
        "service_id": "svc-1",
        "timezone": "Asia/Singapore",
        "rule_type": "monthly",
        "open_time": null,
        "close_time": null,
        "effective_from": "2026-01-01",
        "effective_to": null,
        "is_active": true
      },
      "rules": [
        {"id": "0b7d9a52-54a4-4c7e-9f1e-2f7a7f0b9e11", "schedule_id": "x",
         "rule_type": "monthly_nth_weekday", "weekday": 5, "month_day": null,
         "nth": -1, "start_time": "10:00", "end_time": "14:00"}
      ],
      "exceptions": []
    }"#;

    let payload: SchedulePayload =
      serde_json::from_str(raw)
        .expect("decode envelope");
    let schedule = payload
      .schedule
      .expect("schedule present");
    assert_eq!(
      schedule.rule_type,
      RuleType::Monthly
    );
    assert_eq!(
      schedule.effective_from,
      NaiveDate::from_ymd_opt(2026, 1, 1)
    );
    assert_eq!(
      payload.rules[0].kind,
      RuleKind::MonthlyNthWeekday
    );
    assert_eq!(payload.rules[0].nth, Some(-1));
  }

  #[test]
  fn missing_schedule_decodes_as_none() {
    let payload: SchedulePayload =
      serde_json::from_str(
        r#"{"schedule": null, "rules": [], "exceptions": []}"#
      )
      .expect("decode envelope");
    assert!(payload.schedule.is_none());
  }
}
