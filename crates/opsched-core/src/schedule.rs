use std::fmt;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

use crate::datetime::parse_timezone;
use crate::error::ScheduleError;
use crate::model::{
  OperatingException,
  OperatingRule,
  OperatingSchedule,
  RuleType
};
use crate::recurrence::{
  CompiledRule,
  Hours
};

/// Open/closed state of one calendar day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize,
)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DayStatus {
  Closed,
  Open { hours: Option<Hours> }
}

impl DayStatus {
  #[must_use]
  pub fn is_open(&self) -> bool {
    matches!(self, Self::Open { .. })
  }
}

impl fmt::Display for DayStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Closed => f.write_str("Closed"),
      | Self::Open { hours: Some(h) } => {
        write!(f, "Open ({h})")
      }
      | Self::Open { hours: None } => {
        f.write_str("Open")
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompiledException {
  pub date:    NaiveDate,
  pub is_open: bool,
  pub hours:   Option<Hours>,
  /// Neither time was supplied (as opposed to only one of them).
  pub untimed: bool
}

impl CompiledException {
  fn compile(
    ex: &OperatingException
  ) -> Result<Self, ScheduleError> {
    let start = blank_to_none(
      ex.start_time.as_deref()
    );
    let end = blank_to_none(
      ex.end_time.as_deref()
    );
    Ok(Self {
      date:    ex.date,
      is_open: ex.is_open,
      hours:   Hours::from_pair(start, end)?,
      untimed: start.is_none()
        && end.is_none()
    })
  }
}

fn blank_to_none(
  raw: Option<&str>
) -> Option<&str> {
  raw.filter(|s| !s.trim().is_empty())
}

/// A schedule whose timezone, times and rules have all been validated.
///
/// Compiling up front is what lets projection fail as a whole instead
/// of returning a partial window.
#[derive(Debug, Clone)]
pub struct CompiledSchedule {
  pub tz:                   Tz,
  pub rule_type:            RuleType,
  pub default_hours:        Option<Hours>,
  pub effective_from:       Option<NaiveDate>,
  pub effective_to:         Option<NaiveDate>,
  pub is_active:            bool,
  pub(crate) rules:         Vec<CompiledRule>,
  pub(crate) exceptions:    Vec<CompiledException>
}

impl CompiledSchedule {
  #[tracing::instrument(
    skip_all,
    fields(
      timezone = %schedule.timezone,
      rule_type = %schedule.rule_type,
      rules = rules.len(),
      exceptions = exceptions.len()
    )
  )]
  pub fn compile(
    schedule: &OperatingSchedule,
    rules: &[OperatingRule],
    exceptions: &[OperatingException]
  ) -> Result<Self, ScheduleError> {
    let tz =
      parse_timezone(&schedule.timezone)?;
    let default_hours = Hours::from_pair(
      schedule.open_time.as_deref(),
      schedule.close_time.as_deref()
    )?;

    let mut compiled_rules =
      Vec::with_capacity(rules.len());
    for rule in rules {
      if let Some(compiled) =
        CompiledRule::compile(rule)?
      {
        compiled_rules.push(compiled);
      }
    }

    let compiled_exceptions = exceptions
      .iter()
      .map(CompiledException::compile)
      .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
      usable_rules = compiled_rules.len(),
      "compiled schedule"
    );

    Ok(Self {
      tz,
      rule_type: schedule.rule_type,
      default_hours,
      effective_from: schedule
        .effective_from,
      effective_to: schedule.effective_to,
      is_active: schedule.is_active,
      rules: compiled_rules,
      exceptions: compiled_exceptions
    })
  }

  /// Whether the schedule governs `date` at all.
  #[must_use]
  pub fn applies_on(
    &self,
    date: NaiveDate
  ) -> bool {
    self.is_active
      && self
        .effective_from
        .is_none_or(|from| date >= from)
      && self
        .effective_to
        .is_none_or(|to| date <= to)
  }

  pub(crate) fn exceptions_on(
    &self,
    date: NaiveDate
  ) -> impl Iterator<Item = &CompiledException>
  {
    self
      .exceptions
      .iter()
      .filter(move |ex| ex.date == date)
  }

  /// First rule, in list order, that selects `date` under this
  /// schedule's rule type. Daily schedules have no rules to match.
  pub(crate) fn matching_rule(
    &self,
    date: NaiveDate
  ) -> Option<&CompiledRule> {
    let monthly = match self.rule_type {
      | RuleType::Daily => return None,
      | RuleType::Weekly => false,
      | RuleType::Monthly => true
    };
    self.rules.iter().find(|rule| {
      rule.recurrence.is_monthly()
        == monthly
        && rule.recurrence.matches(date)
    })
  }

  /// Resolves one calendar date (already in the schedule timezone).
  #[must_use]
  pub fn status_on(
    &self,
    date: NaiveDate
  ) -> DayStatus {
    if !self.applies_on(date) {
      return DayStatus::Closed;
    }

    let day_exceptions: Vec<_> =
      self.exceptions_on(date).collect();

    if let Some(hours) = day_exceptions
      .iter()
      .filter(|ex| ex.is_open)
      .find_map(|ex| ex.hours)
    {
      return DayStatus::Open {
        hours: Some(hours)
      };
    }
    if day_exceptions
      .iter()
      .any(|ex| !ex.is_open)
    {
      return DayStatus::Closed;
    }
    if day_exceptions
      .iter()
      .any(|ex| ex.is_open && ex.untimed)
    {
      return DayStatus::Open {
        hours: self.default_hours
      };
    }

    if self.rule_type == RuleType::Daily {
      return DayStatus::Open {
        hours: self.default_hours
      };
    }

    match self.matching_rule(date) {
      | Some(rule) => DayStatus::Open {
        hours: rule
          .hours
          .or(self.default_hours)
      },
      | None => DayStatus::Closed
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn status_labels() {
    let hours = Hours::from_pair(
      Some("09:00"),
      Some("17:00")
    )
    .expect("valid hours");
    assert_eq!(
      DayStatus::Open { hours }
        .to_string(),
      "Open (09:00 - 17:00)"
    );
    assert_eq!(
      DayStatus::Open { hours: None }
        .to_string(),
      "Open"
    );
    assert_eq!(
      DayStatus::Closed.to_string(),
      "Closed"
    );
  }

  #[test]
  fn half_timed_open_exception_falls_through_to_rules() {
    let schedule = OperatingSchedule::new(
      "UTC",
      RuleType::Weekly
    );
    // 2026-02-02 is a Monday.
    let rules = [OperatingRule::weekly(1)
      .with_hours("08:00", "12:00")];
    let mut ex =
      OperatingException::open(date(
        2026, 2, 2
      ));
    ex.start_time =
      Some("10:00".to_string());

    let compiled = CompiledSchedule::compile(
      &schedule,
      &rules,
      &[ex]
    )
    .expect("compile");
    assert_eq!(
      compiled
        .status_on(date(2026, 2, 2))
        .to_string(),
      "Open (08:00 - 12:00)"
    );
  }

  #[test]
  fn weekly_schedule_ignores_monthly_rules() {
    let schedule = OperatingSchedule::new(
      "UTC",
      RuleType::Weekly
    );
    let rules =
      [OperatingRule::monthly_day(2)
        .with_hours("08:00", "12:00")];
    let compiled = CompiledSchedule::compile(
      &schedule, &rules, &[]
    )
    .expect("compile");
    assert_eq!(
      compiled.status_on(date(2026, 2, 2)),
      DayStatus::Closed
    );
  }

  #[test]
  fn rule_without_hours_uses_defaults() {
    let mut schedule =
      OperatingSchedule::new(
        "UTC",
        RuleType::Monthly
      );
    schedule.open_time =
      Some("10:00".to_string());
    schedule.close_time =
      Some("16:00".to_string());
    let rules =
      [OperatingRule::monthly_day(15)];
    let compiled = CompiledSchedule::compile(
      &schedule, &rules, &[]
    )
    .expect("compile");
    assert_eq!(
      compiled
        .status_on(date(2026, 3, 15))
        .to_string(),
      "Open (10:00 - 16:00)"
    );
  }
}
