use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::booking::admits;
use crate::cli::Command;
use crate::config::Config;
use crate::datetime::{parse_date_expr, parse_optional_clock_time, parse_timezone};
use crate::model::{OperatingException, OperatingRule, OperatingSchedule, SchedulePayload};
use crate::projector::project;
use crate::render::Renderer;
use crate::store::ScheduleStore;

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch(
    store: &mut ScheduleStore,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = command.unwrap_or(Command::Preview {
        days: None,
        now: None,
        json: false,
    });
    debug!(?command, "dispatching command");

    match command {
        Command::Preview { days, now: anchor, json } => {
            cmd_preview(store, cfg, renderer, days, anchor.as_deref(), json, now)
        }
        Command::Show => cmd_show(store, renderer),
        Command::Rules => renderer.print_rules(&store.load()?.rules),
        Command::Exceptions => renderer.print_exceptions(&store.load()?.exceptions),
        Command::Schedule {
            timezone,
            rule_type,
            open,
            close,
            from,
            to,
            inactive,
            service_id,
        } => {
            parse_timezone(&timezone)?;
            parse_optional_clock_time(open.as_deref())?;
            parse_optional_clock_time(close.as_deref())?;

            let mut schedule = OperatingSchedule::new(timezone, rule_type.into());
            schedule.open_time = open.filter(|s| !s.trim().is_empty());
            schedule.close_time = close.filter(|s| !s.trim().is_empty());
            schedule.effective_from = from.as_deref().map(parse_day).transpose()?;
            schedule.effective_to = to.as_deref().map(parse_day).transpose()?;
            schedule.is_active = !inactive;
            schedule.service_id = service_id;

            if let (Some(from), Some(to)) = (schedule.effective_from, schedule.effective_to)
                && to < from
            {
                return Err(anyhow!("effective range ends ({to}) before it starts ({from})"));
            }

            let payload = store.upsert_schedule(schedule)?;
            println!("Saved schedule.");
            renderer.print_schedule(payload.schedule.as_ref())
        }
        Command::RuleAdd {
            kind,
            weekday,
            day,
            nth,
            start,
            end,
        } => {
            parse_optional_clock_time(start.as_deref())?;
            parse_optional_clock_time(end.as_deref())?;

            let rule = OperatingRule {
                id: None,
                kind: kind.into(),
                weekday,
                month_day: day,
                nth,
                start_time: start,
                end_time: end,
            };
            let payload = store.add_rule(rule)?;
            println!("Added rule {}.", payload.rules.len());
            renderer.print_rules(&payload.rules)
        }
        Command::RuleDelete { id } => {
            let payload = store.delete_rule(id)?;
            println!("Deleted rule {id}.");
            renderer.print_rules(&payload.rules)
        }
        Command::ExceptionAdd {
            date,
            open,
            start,
            end,
            reason,
        } => {
            parse_optional_clock_time(start.as_deref())?;
            parse_optional_clock_time(end.as_deref())?;

            let mut exception = if open {
                OperatingException::open(parse_day(&date)?)
            } else {
                OperatingException::closed(parse_day(&date)?)
            };
            exception.start_time = start;
            exception.end_time = end;
            exception.reason = reason;

            let payload = store.add_exception(exception)?;
            println!("Added exception for {date}.");
            renderer.print_exceptions(&payload.exceptions)
        }
        Command::ExceptionDelete { id } => {
            let payload = store.delete_exception(id)?;
            println!("Deleted exception {id}.");
            renderer.print_exceptions(&payload.exceptions)
        }
        Command::Check { start, end } => cmd_check(store, &start, &end, now),
        Command::Import { file } => cmd_import(store, &file),
        Command::Export => cmd_export(store),
        Command::Config => cmd_config(cfg),
    }
}

fn parse_day(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("expected a YYYY-MM-DD date, got {raw:?}"))
}

/// Zone used to read user-entered instants: the schedule's, else UTC.
fn schedule_zone(payload: &SchedulePayload) -> anyhow::Result<Tz> {
    match &payload.schedule {
        Some(schedule) => Ok(parse_timezone(&schedule.timezone)?),
        None => Ok(chrono_tz::UTC),
    }
}

#[instrument(skip(store, cfg, renderer, now))]
fn cmd_preview(
    store: &mut ScheduleStore,
    cfg: &Config,
    renderer: &mut Renderer,
    days: Option<u32>,
    anchor: Option<&str>,
    json: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command preview");

    let payload = store.load()?;
    let schedule = payload
        .schedule
        .as_ref()
        .ok_or_else(|| anyhow!("no schedule saved; run `opsched schedule` first"))?;

    let window = match days {
        Some(days) => days,
        None => cfg.preview_days()?,
    };
    let reference_now = match anchor {
        Some(expr) => parse_date_expr(expr, now, &schedule_zone(&payload)?)?,
        None => now,
    };

    let projected = project(
        schedule,
        &payload.rules,
        &payload.exceptions,
        window,
        reference_now,
    )
    .context("failed to project schedule")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&projected)?);
        return Ok(());
    }
    renderer.print_preview(&projected)
}

#[instrument(skip(store, renderer))]
fn cmd_show(store: &mut ScheduleStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    let payload = store.load()?;
    renderer.print_schedule(payload.schedule.as_ref())?;
    println!();
    renderer.print_rules(&payload.rules)?;
    println!();
    renderer.print_exceptions(&payload.exceptions)
}

#[instrument(skip(store, now))]
fn cmd_check(
    store: &mut ScheduleStore,
    start: &str,
    end: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command check");

    let payload = store.load()?;
    let tz = schedule_zone(&payload)?;
    let start = parse_date_expr(start, now, &tz).context("invalid --start")?;
    let end = parse_date_expr(end, now, &tz).context("invalid --end")?;

    let allowed = admits(
        payload.schedule.as_ref(),
        &payload.rules,
        &payload.exceptions,
        start,
        end,
    )?;

    let local_start = start.with_timezone(&tz).format("%Y-%m-%d %H:%M");
    let local_end = end.with_timezone(&tz).format("%Y-%m-%d %H:%M");
    if allowed {
        println!("Allowed: {local_start} - {local_end} ({}).", tz.name());
    } else {
        println!("Outside operating hours: {local_start} - {local_end} ({}).", tz.name());
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_import(store: &mut ScheduleStore, file: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let payload: SchedulePayload = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a schedule envelope", file.display()))?;

    if let Some(schedule) = &payload.schedule {
        parse_timezone(&schedule.timezone)?;
    }

    let payload = store.import(payload)?;
    println!(
        "Imported schedule with {} rule(s) and {} exception(s).",
        payload.rules.len(),
        payload.exceptions.len()
    );
    Ok(())
}

fn cmd_export(store: &mut ScheduleStore) -> anyhow::Result<()> {
    let payload = store.load()?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        println!("{k}={v}");
    }
    for file in &cfg.loaded_files {
        debug!(file = %file.display(), "config file");
    }
    Ok(())
}
