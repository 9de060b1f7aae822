use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::model::{OperatingException, OperatingRule, OperatingSchedule};
use crate::projector::ProjectedDay;
use crate::recurrence::describe;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, days))]
    pub fn print_preview(&mut self, days: &[ProjectedDay]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec!["Date".to_string(), "Day".to_string(), "Status".to_string()];
        let mut rows = Vec::with_capacity(days.len());
        for day in days {
            let status = day.status.to_string();
            let status = if day.status.is_open() {
                self.paint(&status, "32")
            } else {
                self.paint(&status, "31")
            };
            rows.push(vec![
                day.date.format("%Y-%m-%d").to_string(),
                day.weekday_label.to_string(),
                status,
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, rules))]
    pub fn print_rules(&mut self, rules: &[OperatingRule]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if rules.is_empty() {
            writeln!(out, "No rules added.")?;
            return Ok(());
        }

        let headers = vec!["#".to_string(), "Rule".to_string(), "Hours".to_string(), "ID".to_string()];
        let rows = rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    describe(rule),
                    hours_cell(rule.start_time.as_deref(), rule.end_time.as_deref()),
                    rule.id.map(|id| id.to_string()).unwrap_or_default(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, exceptions))]
    pub fn print_exceptions(&mut self, exceptions: &[OperatingException]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if exceptions.is_empty() {
            writeln!(out, "No exceptions added.")?;
            return Ok(());
        }

        let headers = vec![
            "Date".to_string(),
            "State".to_string(),
            "Hours".to_string(),
            "Reason".to_string(),
            "ID".to_string(),
        ];
        let rows = exceptions
            .iter()
            .map(|ex| {
                let state = if ex.is_open {
                    self.paint("Open", "32")
                } else {
                    self.paint("Closed", "31")
                };
                vec![
                    ex.date.format("%Y-%m-%d").to_string(),
                    state,
                    hours_cell(ex.start_time.as_deref(), ex.end_time.as_deref()),
                    ex.reason.clone().unwrap_or_default(),
                    ex.id.map(|id| id.to_string()).unwrap_or_default(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, schedule))]
    pub fn print_schedule(&mut self, schedule: Option<&OperatingSchedule>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let Some(schedule) = schedule else {
            writeln!(out, "No schedule saved.")?;
            return Ok(());
        };

        writeln!(
            out,
            "id        {}",
            schedule
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "timezone  {}", schedule.timezone)?;
        writeln!(out, "type      {}", schedule.rule_type)?;
        writeln!(
            out,
            "hours     {}",
            hours_cell(schedule.open_time.as_deref(), schedule.close_time.as_deref())
        )?;
        if let Some(from) = schedule.effective_from {
            writeln!(out, "from      {}", from.format("%Y-%m-%d"))?;
        }
        if let Some(to) = schedule.effective_to {
            writeln!(out, "to        {}", to.format("%Y-%m-%d"))?;
        }
        let active = if schedule.is_active {
            self.paint("yes", "32")
        } else {
            self.paint("no", "31")
        };
        writeln!(out, "active    {active}")?;

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn hours_cell(start: Option<&str>, end: Option<&str>) -> String {
    let start = start.filter(|s| !s.is_empty());
    let end = end.filter(|s| !s.is_empty());
    if start.is_none() && end.is_none() {
        return String::new();
    }
    format!("{} - {}", start.unwrap_or("--"), end.unwrap_or("--"))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
