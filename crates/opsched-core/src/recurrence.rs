use std::fmt;

use chrono::{
  Datelike,
  Months,
  NaiveDate,
  NaiveTime,
  Weekday
};
use serde::Serialize;

use crate::datetime::{
  hhmm_serde,
  parse_optional_clock_time,
  weekday_from_index,
  weekday_long_label
};
use crate::error::ScheduleError;
use crate::model::{
  OperatingRule,
  RuleKind
};

/// An opening window within one day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize,
)]
pub struct Hours {
  #[serde(serialize_with = "hhmm_serde::serialize")]
  pub start: NaiveTime,
  #[serde(serialize_with = "hhmm_serde::serialize")]
  pub end:   NaiveTime
}

impl Hours {
  /// Both ends present, or no hours at all.
  pub fn from_pair(
    start: Option<&str>,
    end: Option<&str>
  ) -> Result<Option<Self>, ScheduleError>
  {
    let start =
      parse_optional_clock_time(start)?;
    let end =
      parse_optional_clock_time(end)?;
    Ok(match (start, end) {
      | (Some(start), Some(end)) => {
        Some(Self { start, end })
      }
      | _ => None
    })
  }
}

impl fmt::Display for Hours {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{} - {}",
      self.start.format("%H:%M"),
      self.end.format("%H:%M")
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nth {
  Ordinal(u32),
  Last
}

impl Nth {
  #[must_use]
  pub fn from_index(
    raw: i32
  ) -> Option<Self> {
    match raw {
      | -1 => Some(Self::Last),
      | 1..=5 => {
        u32::try_from(raw)
          .ok()
          .map(Self::Ordinal)
      }
      | _ => None
    }
  }

  fn label(self) -> &'static str {
    match self {
      | Self::Ordinal(1) => "1st",
      | Self::Ordinal(2) => "2nd",
      | Self::Ordinal(3) => "3rd",
      | Self::Ordinal(4) => "4th",
      | Self::Ordinal(_) => "5th",
      | Self::Last => "Last"
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
  Weekly {
    weekday: Weekday
  },
  MonthlyDay {
    day_of_month: u32
  },
  MonthlyNthWeekday {
    nth:     Nth,
    weekday: Weekday
  }
}

impl Recurrence {
  /// Whether `date` is selected by this pattern.
  #[must_use]
  pub fn matches(
    &self,
    date: NaiveDate
  ) -> bool {
    match *self {
      | Self::Weekly { weekday } => {
        date.weekday() == weekday
      }
      | Self::MonthlyDay {
        day_of_month
      } => date.day() == day_of_month,
      | Self::MonthlyNthWeekday {
        nth,
        weekday
      } => is_nth_weekday(date, weekday, nth)
    }
  }

  #[must_use]
  pub fn is_monthly(&self) -> bool {
    !matches!(self, Self::Weekly { .. })
  }
}

/// Whether `date` is the `nth` occurrence of `weekday` in its month,
/// counting from the 1st, or the month's final occurrence for
/// [`Nth::Last`].
#[must_use]
pub fn is_nth_weekday(
  date: NaiveDate,
  weekday: Weekday,
  nth: Nth
) -> bool {
  if date.weekday() != weekday {
    return false;
  }

  match nth {
    | Nth::Ordinal(n) => {
      (date.day() - 1) / 7 + 1 == n
    }
    | Nth::Last => {
      last_weekday_of_month(
        date.year(),
        date.month(),
        weekday
      ) == Some(date.day())
    }
  }
}

/// Day-of-month of the final `weekday` in the month, found by walking
/// back from the month's last calendar day.
#[must_use]
pub fn last_weekday_of_month(
  year: i32,
  month: u32,
  weekday: Weekday
) -> Option<u32> {
  let last_date =
    NaiveDate::from_ymd_opt(year, month, 1)?
      .checked_add_months(Months::new(1))?
      .pred_opt()?;
  let last_idx = last_date
    .weekday()
    .num_days_from_sunday();
  let target_idx =
    weekday.num_days_from_sunday();
  let offset =
    (last_idx + 7 - target_idx) % 7;
  Some(last_date.day() - offset)
}

/// A validated rule, ready to be matched against dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
  pub recurrence: Recurrence,
  pub hours:      Option<Hours>
}

impl CompiledRule {
  /// Validates the rule's hours and resolves its date selector.
  ///
  /// `Ok(None)` means the selector fields are missing or out of range;
  /// such a rule can never match a date.
  pub fn compile(
    rule: &OperatingRule
  ) -> Result<Option<Self>, ScheduleError>
  {
    let hours = Hours::from_pair(
      rule.start_time.as_deref(),
      rule.end_time.as_deref()
    )?;

    let Some(recurrence) =
      recurrence_of(rule)
    else {
      tracing::warn!(
        rule_id = ?rule.id,
        kind = ?rule.kind,
        weekday = ?rule.weekday,
        month_day = ?rule.month_day,
        nth = ?rule.nth,
        "rule selector incomplete or out of range; it will never match"
      );
      return Ok(None);
    };

    Ok(Some(Self { recurrence, hours }))
  }
}

fn recurrence_of(
  rule: &OperatingRule
) -> Option<Recurrence> {
  match rule.kind {
    | RuleKind::Weekly => {
      Some(Recurrence::Weekly {
        weekday: weekday_from_index(
          rule.weekday?
        )?
      })
    }
    | RuleKind::MonthlyDay => {
      let day = rule.month_day?;
      if !(1..=31).contains(&day) {
        return None;
      }
      Some(Recurrence::MonthlyDay {
        day_of_month: u32::try_from(day)
          .ok()?
      })
    }
    | RuleKind::MonthlyNthWeekday => {
      Some(Recurrence::MonthlyNthWeekday {
        nth:     Nth::from_index(rule.nth?)?,
        weekday: weekday_from_index(
          rule.weekday?
        )?
      })
    }
  }
}

/// Admin-facing label for a rule, e.g. `Last Friday (monthly)`.
#[must_use]
pub fn describe(
  rule: &OperatingRule
) -> String {
  let day = rule
    .weekday
    .and_then(weekday_from_index)
    .map(weekday_long_label)
    .unwrap_or("Day");

  match rule.kind {
    | RuleKind::Weekly => {
      format!("{day} (weekly)")
    }
    | RuleKind::MonthlyDay => {
      match rule.month_day {
        | Some(n) => {
          format!("Day {n} (monthly)")
        }
        | None => {
          "Day ? (monthly)".to_string()
        }
      }
    }
    | RuleKind::MonthlyNthWeekday => {
      let nth = match rule.nth {
        | Some(raw) => {
          Nth::from_index(raw)
            .map(|n| n.label().to_string())
            .unwrap_or_else(|| {
              raw.to_string()
            })
        }
        | None => "?".to_string()
      };
      format!("{nth} {day} (monthly)")
    }
  }
}
