use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{
    OperatingException, OperatingRule, OperatingSchedule, RuleKind, SchedulePayload,
};

/// A service's schedule envelope kept as one JSON file.
///
/// Every mutation mirrors an operating-schedule endpoint and returns the
/// updated envelope, the way the API responds.
#[derive(Debug)]
pub struct ScheduleStore {
    pub data_dir: PathBuf,
    pub schedule_path: PathBuf,
}

impl ScheduleStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let schedule_path = data_dir.join("schedule.json");
        let store = Self {
            data_dir,
            schedule_path,
        };

        if !store.schedule_path.exists() {
            store.save(&SchedulePayload::default())?;
        }

        info!(
            data_dir = %store.data_dir.display(),
            schedule = %store.schedule_path.display(),
            "opened schedule store"
        );
        Ok(store)
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<SchedulePayload> {
        let raw = fs::read_to_string(&self.schedule_path)
            .with_context(|| format!("failed reading {}", self.schedule_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(SchedulePayload::default());
        }
        let payload: SchedulePayload = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.schedule_path.display()))?;
        debug!(
            has_schedule = payload.schedule.is_some(),
            rules = payload.rules.len(),
            exceptions = payload.exceptions.len(),
            "loaded schedule envelope"
        );
        Ok(payload)
    }

    #[tracing::instrument(skip(self, payload))]
    pub fn save(&self, payload: &SchedulePayload) -> anyhow::Result<()> {
        save_json_atomic(&self.schedule_path, payload).context("failed to save schedule.json")
    }

    /// Creates the schedule, or replaces its fields while keeping its id.
    #[tracing::instrument(skip(self, schedule))]
    pub fn upsert_schedule(
        &self,
        mut schedule: OperatingSchedule,
    ) -> anyhow::Result<SchedulePayload> {
        let mut payload = self.load()?;
        let existing = payload.schedule.as_ref();
        schedule.id = existing
            .and_then(|s| s.id)
            .or(schedule.id)
            .or_else(|| Some(Uuid::new_v4()));
        if schedule.service_id.is_none() {
            schedule.service_id = existing.and_then(|s| s.service_id.clone());
        }
        info!(
            created = existing.is_none(),
            id = ?schedule.id,
            rule_type = %schedule.rule_type,
            "upserting schedule"
        );
        payload.schedule = Some(schedule);
        self.save(&payload)?;
        Ok(payload)
    }

    #[tracing::instrument(skip(self, rule), fields(kind = ?rule.kind))]
    pub fn add_rule(&self, mut rule: OperatingRule) -> anyhow::Result<SchedulePayload> {
        let mut payload = self.load()?;
        if payload.schedule.is_none() {
            return Err(anyhow!("save the schedule before adding rules"));
        }

        match rule.kind {
            RuleKind::Weekly => {
                rule.month_day = None;
                rule.nth = None;
            }
            RuleKind::MonthlyDay => {
                rule.weekday = None;
                rule.nth = None;
            }
            RuleKind::MonthlyNthWeekday => {
                rule.month_day = None;
            }
        }
        rule.start_time = non_blank(rule.start_time);
        rule.end_time = non_blank(rule.end_time);
        rule.id = Some(Uuid::new_v4());

        debug!(id = ?rule.id, "rule added");
        payload.rules.push(rule);
        self.save(&payload)?;
        Ok(payload)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete_rule(&self, id: Uuid) -> anyhow::Result<SchedulePayload> {
        let mut payload = self.load()?;
        let idx = payload
            .rules
            .iter()
            .position(|r| r.id == Some(id))
            .ok_or_else(|| anyhow!("rule not found: {id}"))?;
        payload.rules.remove(idx);
        self.save(&payload)?;
        Ok(payload)
    }

    #[tracing::instrument(skip(self, exception), fields(date = %exception.date))]
    pub fn add_exception(
        &self,
        mut exception: OperatingException,
    ) -> anyhow::Result<SchedulePayload> {
        let mut payload = self.load()?;
        exception.start_time = non_blank(exception.start_time);
        exception.end_time = non_blank(exception.end_time);
        exception.reason = non_blank(exception.reason);
        exception.id = Some(Uuid::new_v4());
        if exception.service_id.is_none() {
            exception.service_id = payload
                .schedule
                .as_ref()
                .and_then(|s| s.service_id.clone());
        }

        debug!(id = ?exception.id, is_open = exception.is_open, "exception added");
        payload.exceptions.push(exception);
        self.save(&payload)?;
        Ok(payload)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete_exception(&self, id: Uuid) -> anyhow::Result<SchedulePayload> {
        let mut payload = self.load()?;
        let idx = payload
            .exceptions
            .iter()
            .position(|ex| ex.id == Some(id))
            .ok_or_else(|| anyhow!("exception not found: {id}"))?;
        payload.exceptions.remove(idx);
        self.save(&payload)?;
        Ok(payload)
    }

    /// Replaces the stored envelope, e.g. with a body fetched from the API.
    #[tracing::instrument(skip(self, payload))]
    pub fn import(&self, payload: SchedulePayload) -> anyhow::Result<SchedulePayload> {
        info!(
            rules = payload.rules.len(),
            exceptions = payload.exceptions.len(),
            "importing schedule envelope"
        );
        self.save(&payload)?;
        Ok(payload)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[tracing::instrument(skip(path, payload))]
fn save_json_atomic(path: &Path, payload: &SchedulePayload) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving schedule atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, payload)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
