use chrono::{
  DateTime,
  Datelike,
  Days,
  NaiveDate,
  Utc
};
use serde::Serialize;

use crate::datetime::{
  local_date,
  weekday_short_label
};
use crate::error::ScheduleError;
use crate::model::{
  OperatingException,
  OperatingRule,
  OperatingSchedule
};
use crate::schedule::{
  CompiledSchedule,
  DayStatus
};

pub const MAX_WINDOW_DAYS: u32 = 366;

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct ProjectedDay {
  pub date:          NaiveDate,
  pub weekday_label: &'static str,
  pub status:        DayStatus
}

/// Projects `schedule` over `window_days` consecutive calendar dates.
///
/// Day 0 is the date of `reference_now` in the schedule's timezone and
/// every later day is one calendar day after the previous, so the host
/// timezone never shifts a day boundary. Rules and exceptions are
/// evaluated in the order given; the first match wins.
#[tracing::instrument(
  skip(schedule, rules, exceptions),
  fields(timezone = %schedule.timezone)
)]
pub fn project(
  schedule: &OperatingSchedule,
  rules: &[OperatingRule],
  exceptions: &[OperatingException],
  window_days: u32,
  reference_now: DateTime<Utc>
) -> Result<Vec<ProjectedDay>, ScheduleError>
{
  if window_days == 0
    || window_days > MAX_WINDOW_DAYS
  {
    return Err(ScheduleError::invalid(
      format!(
        "window must be 1..={MAX_WINDOW_DAYS} \
         days, got {window_days}"
      )
    ));
  }

  let compiled = CompiledSchedule::compile(
    schedule, rules, exceptions
  )?;
  let day_zero =
    local_date(reference_now, &compiled.tz);

  let mut days = Vec::with_capacity(
    window_days as usize
  );
  for offset in 0..u64::from(window_days) {
    let date = day_zero
      .checked_add_days(Days::new(offset))
      .ok_or_else(|| {
        ScheduleError::invalid(format!(
          "window runs past the last \
           representable date after \
           {day_zero}"
        ))
      })?;
    days.push(ProjectedDay {
      date,
      weekday_label: weekday_short_label(
        date.weekday()
      ),
      status: compiled.status_on(date)
    });
  }

  tracing::debug!(
    %day_zero,
    open = days
      .iter()
      .filter(|d| d.status.is_open())
      .count(),
    total = days.len(),
    "projected schedule window"
  );
  Ok(days)
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::*;
  use crate::model::RuleType;

  #[test]
  fn rejects_window_bounds() {
    let schedule = OperatingSchedule::new(
      "UTC",
      RuleType::Daily
    );
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 1, 12, 0, 0
      )
      .single()
      .expect("valid now");

    for days in [0, MAX_WINDOW_DAYS + 1] {
      assert!(matches!(
        project(
          &schedule,
          &[],
          &[],
          days,
          now
        ),
        Err(ScheduleError::InvalidArgument(_))
      ));
    }
    assert_eq!(
      project(
        &schedule,
        &[],
        &[],
        MAX_WINDOW_DAYS,
        now
      )
      .expect("max window")
      .len(),
      MAX_WINDOW_DAYS as usize
    );
  }

  #[test]
  fn malformed_exception_time_fails_whole_projection() {
    let schedule = OperatingSchedule::new(
      "UTC",
      RuleType::Daily
    );
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 1, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let far_away = OperatingException::open(
      chrono::NaiveDate::from_ymd_opt(
        2030, 1, 1
      )
      .expect("valid date")
    )
    .with_hours("25:00", "26:00");

    assert!(matches!(
      project(
        &schedule,
        &[],
        &[far_away],
        7,
        now
      ),
      Err(ScheduleError::InvalidArgument(_))
    ));
  }
}
