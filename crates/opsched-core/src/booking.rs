//! Booking admission against a service's operating schedule.
//!
//! The projector answers "what does the calendar look like"; this
//! answers "may a booking from `start` to `end` happen". The two differ
//! on purpose in one place: a schedule that is inactive, or whose
//! effective range excludes the date, does not restrict bookings at all
//! (there is no governing schedule), whereas the preview shows such
//! days as closed.

use chrono::{
  DateTime,
  Days,
  NaiveDate,
  NaiveTime,
  Utc
};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::{
  local_date,
  to_utc_from_local_or_next
};
use crate::error::ScheduleError;
use crate::model::{
  OperatingException,
  OperatingRule,
  OperatingSchedule,
  RuleType
};
use crate::recurrence::Hours;
use crate::schedule::CompiledSchedule;

#[derive(Debug, Clone, Copy)]
struct Interval {
  start: DateTime<Utc>,
  end:   DateTime<Utc>
}

impl Interval {
  fn contains(
    &self,
    other: &Interval
  ) -> bool {
    other.start >= self.start
      && other.end <= self.end
  }
}

#[tracing::instrument(skip(schedule, rules, exceptions))]
pub fn admits(
  schedule: Option<&OperatingSchedule>,
  rules: &[OperatingRule],
  exceptions: &[OperatingException],
  start: DateTime<Utc>,
  end: DateTime<Utc>
) -> Result<bool, ScheduleError> {
  if end < start {
    return Err(ScheduleError::invalid(
      format!(
        "booking ends ({end}) before it \
         starts ({start})"
      )
    ));
  }

  let Some(schedule) = schedule else {
    debug!("no schedule; booking allowed");
    return Ok(true);
  };

  let compiled = CompiledSchedule::compile(
    schedule, rules, exceptions
  )?;
  let date = local_date(start, &compiled.tz);
  if !compiled.applies_on(date) {
    debug!(
      %date,
      "schedule does not govern date; booking allowed"
    );
    return Ok(true);
  }

  let booking = Interval { start, end };
  let tz = compiled.tz;
  let fits = |hours: Hours| -> Result<bool, ScheduleError> {
    Ok(window(&tz, date, hours)?
      .contains(&booking))
  };

  let day_exceptions: Vec<_> =
    compiled.exceptions_on(date).collect();
  if !day_exceptions.is_empty() {
    let overrides: Vec<Hours> =
      day_exceptions
        .iter()
        .filter(|ex| ex.is_open)
        .filter_map(|ex| ex.hours)
        .collect();
    if !overrides.is_empty() {
      for hours in overrides {
        if fits(hours)? {
          return Ok(true);
        }
      }
      return Ok(false);
    }
    if day_exceptions
      .iter()
      .any(|ex| !ex.is_open)
    {
      return Ok(false);
    }
    // Open exceptions missing a time admit anything inside the day.
    return Ok(
      whole_day(&tz, date)?
        .contains(&booking)
    );
  }

  if compiled.rule_type == RuleType::Daily {
    return match compiled.default_hours {
      | Some(hours) => fits(hours),
      | None => Ok(true)
    };
  }

  match compiled.matching_rule(date) {
    | Some(rule) => {
      match rule
        .hours
        .or(compiled.default_hours)
      {
        | Some(hours) => fits(hours),
        | None => Ok(true)
      }
    }
    | None => {
      debug!(
        %date,
        "no rule opens this date"
      );
      Ok(false)
    }
  }
}

fn window(
  tz: &Tz,
  date: NaiveDate,
  hours: Hours
) -> Result<Interval, ScheduleError> {
  Ok(Interval {
    start: to_utc_from_local_or_next(
      tz,
      date.and_time(hours.start),
      "opening time"
    )?,
    end:   to_utc_from_local_or_next(
      tz,
      date.and_time(hours.end),
      "closing time"
    )?
  })
}

fn whole_day(
  tz: &Tz,
  date: NaiveDate
) -> Result<Interval, ScheduleError> {
  let next = date
    .checked_add_days(Days::new(1))
    .ok_or_else(|| {
      ScheduleError::invalid(format!(
        "no day follows {date}"
      ))
    })?;
  Ok(Interval {
    start: to_utc_from_local_or_next(
      tz,
      date.and_time(NaiveTime::MIN),
      "start of day"
    )?,
    end:   to_utc_from_local_or_next(
      tz,
      next.and_time(NaiveTime::MIN),
      "end of day"
    )?
  })
}
