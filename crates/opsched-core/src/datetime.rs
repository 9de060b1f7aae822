use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeDelta,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::ScheduleError;

const FALLBACK_TIMEZONE: Tz =
  chrono_tz::UTC;
const GAP_SEARCH_MINUTES: i64 = 24 * 60;

/// Resolves an IANA zone id. An empty id means UTC, the way the admin
/// form treats an unset timezone field.
pub fn parse_timezone(
  raw: &str
) -> Result<Tz, ScheduleError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::debug!(
      "empty timezone; falling back \
       to UTC"
    );
    return Ok(FALLBACK_TIMEZONE);
  }

  trimmed.parse::<Tz>().map_err(|err| {
    tracing::warn!(
      timezone = %trimmed,
      error = %err,
      "failed to parse timezone id"
    );
    ScheduleError::InvalidTimezone {
      zone: trimmed.to_string()
    }
  })
}

/// Parses a 24-hour `HH:MM` wall time. A trailing `:SS`, as SQL `TIME`
/// columns serialize it, is accepted and dropped.
pub fn parse_clock_time(
  raw: &str
) -> Result<NaiveTime, ScheduleError> {
  let clock_re = Regex::new(
    r"^(?P<hour>\d{2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?$"
  )
  .map_err(|e| {
    ScheduleError::invalid(format!(
      "internal regex compile \
       failure: {e}"
    ))
  })?;

  let malformed = || {
    ScheduleError::invalid(format!(
      "malformed time {raw:?}; \
       expected HH:MM"
    ))
  };

  let captures = clock_re
    .captures(raw.trim())
    .ok_or_else(malformed)?;
  let hour = captures
    .name("hour")
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    })
    .ok_or_else(malformed)?;
  let minute = captures
    .name("minute")
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    })
    .ok_or_else(malformed)?;
  if let Some(second) =
    captures.name("second")
    && second
      .as_str()
      .parse::<u32>()
      .map_or(true, |s| s > 59)
  {
    return Err(malformed());
  }

  NaiveTime::from_hms_opt(
    hour, minute, 0
  )
  .ok_or_else(malformed)
}

/// Like [`parse_clock_time`], but blank or missing input is `None`.
pub fn parse_optional_clock_time(
  raw: Option<&str>
) -> Result<Option<NaiveTime>, ScheduleError>
{
  match raw.map(str::trim) {
    | None | Some("") => Ok(None),
    | Some(value) => {
      parse_clock_time(value).map(Some)
    }
  }
}

/// Maps the API's weekday index (0 = Sunday .. 6 = Saturday).
#[must_use]
pub fn weekday_from_index(
  index: i32
) -> Option<Weekday> {
  match index {
    | 0 => Some(Weekday::Sun),
    | 1 => Some(Weekday::Mon),
    | 2 => Some(Weekday::Tue),
    | 3 => Some(Weekday::Wed),
    | 4 => Some(Weekday::Thu),
    | 5 => Some(Weekday::Fri),
    | 6 => Some(Weekday::Sat),
    | _ => None
  }
}

#[must_use]
pub fn weekday_short_label(
  weekday: Weekday
) -> &'static str {
  match weekday {
    | Weekday::Sun => "Sun",
    | Weekday::Mon => "Mon",
    | Weekday::Tue => "Tue",
    | Weekday::Wed => "Wed",
    | Weekday::Thu => "Thu",
    | Weekday::Fri => "Fri",
    | Weekday::Sat => "Sat"
  }
}

#[must_use]
pub fn weekday_long_label(
  weekday: Weekday
) -> &'static str {
  match weekday {
    | Weekday::Sun => "Sunday",
    | Weekday::Mon => "Monday",
    | Weekday::Tue => "Tuesday",
    | Weekday::Wed => "Wednesday",
    | Weekday::Thu => "Thursday",
    | Weekday::Fri => "Friday",
    | Weekday::Sat => "Saturday"
  }
}

/// Calendar date of `instant` as observed in `tz`.
#[must_use]
pub fn local_date(
  instant: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  instant.with_timezone(tz).date_naive()
}

pub fn to_utc_from_local(
  tz: &Tz,
  local_naive: NaiveDateTime,
  context: &str
) -> Result<DateTime<Utc>, ScheduleError> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(ScheduleError::invalid(
        format!(
          "local datetime {local_naive} \
           does not exist in {}: \
           {context}",
          tz.name()
        )
      ))
    }
  }
}

/// Like [`to_utc_from_local`], but a wall time skipped by a DST jump
/// resolves to the first minute after the gap, as a wall clock would.
pub fn to_utc_from_local_or_next(
  tz: &Tz,
  local_naive: NaiveDateTime,
  context: &str
) -> Result<DateTime<Utc>, ScheduleError> {
  if !matches!(
    tz.from_local_datetime(&local_naive),
    LocalResult::None
  ) {
    return to_utc_from_local(
      tz,
      local_naive,
      context
    );
  }

  for minutes in 1..=GAP_SEARCH_MINUTES {
    let Some(candidate) = local_naive
      .checked_add_signed(
        TimeDelta::minutes(minutes)
      )
    else {
      break;
    };
    if !matches!(
      tz.from_local_datetime(&candidate),
      LocalResult::None
    ) {
      tracing::debug!(
        context,
        skipped = %local_naive,
        resolved = %candidate,
        "local datetime in DST gap; moved forward"
      );
      return to_utc_from_local(
        tz, candidate, context
      );
    }
  }

  to_utc_from_local(
    tz,
    local_naive,
    context
  )
}

#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      let midnight =
        local_date(now, tz)
          .and_time(NaiveTime::MIN);
      return Ok(to_utc_from_local(
        tz, midnight, "today"
      )?);
    }
    | "tomorrow" => {
      let today =
        parse_date_expr("today", now, tz)?;
      return today
        .checked_add_signed(TimeDelta::days(1))
        .ok_or_else(|| {
          anyhow!("no day follows {today}")
        });
    }
    | "yesterday" => {
      let today =
        parse_date_expr("today", now, tz)?;
      return today
        .checked_sub_signed(TimeDelta::days(1))
        .ok_or_else(|| {
          anyhow!("no day precedes {today}")
        });
    }
    | _ => {}
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let duration = match unit {
      | "d" => TimeDelta::try_days(num),
      | "h" => TimeDelta::try_hours(num),
      | "m" => TimeDelta::try_minutes(num),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ))
      }
    };
    let shifted =
      duration.and_then(|duration| {
        if sign == "-" {
          now.checked_sub_signed(duration)
        } else {
          now.checked_add_signed(duration)
        }
      });

    return shifted.ok_or_else(|| {
      anyhow!(
        "relative offset out of range: \
         {input}"
      )
    });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(to_utc_from_local(
      tz,
      date.and_time(NaiveTime::MIN),
      "date"
    )?);
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(to_utc_from_local(
        tz, ndt, fmt
      )?);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     +Nd/+Nh/+Nm, RFC3339, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM, \
     YYYY-MM-DD HH:MM"
  })
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveDateTime,
    NaiveTime,
    TimeZone,
    Utc
  };

  use super::{
    local_date,
    parse_clock_time,
    parse_date_expr,
    parse_optional_clock_time,
    parse_timezone,
    to_utc_from_local,
    to_utc_from_local_or_next
  };
  use crate::error::ScheduleError;

  #[test]
  fn rejects_unknown_timezone() {
    let err =
      parse_timezone("Mars/Olympus")
        .expect_err("unknown zone");
    assert_eq!(
      err,
      ScheduleError::InvalidTimezone {
        zone: "Mars/Olympus".to_string()
      }
    );
  }

  #[test]
  fn blank_timezone_is_utc() {
    assert_eq!(
      parse_timezone("  ")
        .expect("blank zone"),
      chrono_tz::UTC
    );
  }

  #[test]
  fn parses_clock_times() {
    assert_eq!(
      parse_clock_time("09:30")
        .expect("hh:mm"),
      NaiveTime::from_hms_opt(9, 30, 0)
        .expect("valid time")
    );
    assert_eq!(
      parse_clock_time("17:00:00")
        .expect("hh:mm:ss"),
      NaiveTime::from_hms_opt(17, 0, 0)
        .expect("valid time")
    );
    for bad in
      ["9:30", "24:00", "12:60", "noon", "12:00:61"]
    {
      assert!(
        matches!(
          parse_clock_time(bad),
          Err(ScheduleError::InvalidArgument(_))
        ),
        "{bad} should be rejected"
      );
    }
  }

  #[test]
  fn blank_clock_time_is_absent() {
    assert_eq!(
      parse_optional_clock_time(Some(""))
        .expect("blank"),
      None
    );
    assert_eq!(
      parse_optional_clock_time(None)
        .expect("missing"),
      None
    );
  }

  #[test]
  fn local_date_follows_zone() {
    let instant = Utc
      .with_ymd_and_hms(
        2026, 2, 1, 3, 0, 0
      )
      .single()
      .expect("valid instant");
    let new_york = parse_timezone(
      "America/New_York"
    )
    .expect("zone");
    assert_eq!(
      local_date(instant, &new_york)
        .format("%Y-%m-%d")
        .to_string(),
      "2026-01-31"
    );
  }

  #[test]
  fn parses_local_date_time_in_zone() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let tokyo = parse_timezone(
      "Asia/Tokyo"
    )
    .expect("zone");
    let parsed = parse_date_expr(
      "2026-02-18T09:00",
      now,
      &tokyo
    )
    .expect("parse local datetime");
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2026, 2, 18, 0, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn parses_relative_days() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let parsed = parse_date_expr(
      "+2d",
      now,
      &chrono_tz::UTC
    )
    .expect("parse relative");
    assert_eq!(
      local_date(parsed, &chrono_tz::UTC)
        .format("%Y-%m-%d")
        .to_string(),
      "2026-02-19"
    );
  }

  fn new_york_wall(
    y: i32,
    m: u32,
    d: u32,
    h: u32,
    min: u32
  ) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
      .and_then(|date| {
        date.and_hms_opt(h, min, 0)
      })
      .expect("valid wall time")
  }

  #[test]
  fn wall_time_in_dst_gap_is_invalid() {
    let new_york = parse_timezone(
      "America/New_York"
    )
    .expect("zone");
    // Clocks jump from 02:00 to 03:00.
    let err = to_utc_from_local(
      &new_york,
      new_york_wall(2026, 3, 8, 2, 30),
      "opening time"
    )
    .expect_err("nonexistent wall time");
    assert!(matches!(
      err,
      ScheduleError::InvalidArgument(_)
    ));
  }

  #[test]
  fn ambiguous_wall_time_uses_earliest() {
    let new_york = parse_timezone(
      "America/New_York"
    )
    .expect("zone");
    // 01:30 happens twice; the EDT reading comes first.
    let resolved = to_utc_from_local(
      &new_york,
      new_york_wall(2026, 11, 1, 1, 30),
      "opening time"
    )
    .expect("ambiguous wall time");
    assert_eq!(
      resolved,
      Utc
        .with_ymd_and_hms(
          2026, 11, 1, 5, 30, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn gap_wall_time_moves_to_end_of_gap() {
    let new_york = parse_timezone(
      "America/New_York"
    )
    .expect("zone");
    let resolved =
      to_utc_from_local_or_next(
        &new_york,
        new_york_wall(2026, 3, 8, 2, 30),
        "opening time"
      )
      .expect("gap resolves forward");
    // 03:00 EDT.
    assert_eq!(
      resolved,
      Utc
        .with_ymd_and_hms(
          2026, 3, 8, 7, 0, 0
        )
        .single()
        .expect("valid instant")
    );

    let ordinary =
      to_utc_from_local_or_next(
        &new_york,
        new_york_wall(2026, 3, 9, 9, 0),
        "opening time"
      )
      .expect("ordinary wall time");
    assert_eq!(
      ordinary,
      Utc
        .with_ymd_and_hms(
          2026, 3, 9, 13, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn oversized_relative_offsets_are_errors() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    for input in [
      "+200000000d",
      "-200000000d",
      "+999999999999999d",
      "+999999999999h"
    ] {
      let err = parse_date_expr(
        input,
        now,
        &chrono_tz::UTC
      )
      .expect_err("offset out of range");
      assert!(
        err
          .to_string()
          .contains("out of range"),
        "{input}: {err:#}"
      );
    }
  }
}

/// Serializes wall times as the API's `HH:MM` strings.
pub mod hhmm_serde {
  use chrono::NaiveTime;
  use serde::Serializer;

  pub fn serialize<S>(
    time: &NaiveTime,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &time.format("%H:%M").to_string()
    )
  }
}
