use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::model::{RuleKind, RuleType};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "opsched",
    version,
    about = "Preview and edit a service's operating schedule",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Day-by-day open/closed preview
    Preview {
        #[arg(long)]
        days: Option<u32>,
        /// Anchor for day 0 (defaults to now)
        #[arg(long)]
        now: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Schedule, rules and exceptions at a glance
    Show,
    Rules,
    Exceptions,
    /// Create or replace the schedule
    Schedule {
        #[arg(long, default_value = "UTC")]
        timezone: String,
        #[arg(long = "rule-type", value_enum)]
        rule_type: RuleTypeArg,
        #[arg(long)]
        open: Option<String>,
        #[arg(long)]
        close: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        inactive: bool,
        #[arg(long = "service-id")]
        service_id: Option<String>,
    },
    RuleAdd {
        #[arg(long, value_enum)]
        kind: RuleKindArg,
        /// 0 = Sunday .. 6 = Saturday
        #[arg(long)]
        weekday: Option<i32>,
        #[arg(long)]
        day: Option<i32>,
        /// 1..5, or -1 for the last occurrence
        #[arg(long, allow_hyphen_values = true)]
        nth: Option<i32>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    RuleDelete {
        id: Uuid,
    },
    ExceptionAdd {
        #[arg(long)]
        date: String,
        #[arg(long)]
        open: bool,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    ExceptionDelete {
        id: Uuid,
    },
    /// Whether the schedule admits a booking
    Check {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Replace the stored envelope with an API response body
    Import {
        file: PathBuf,
    },
    Export,
    /// Effective configuration
    Config,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum RuleTypeArg {
    Daily,
    Weekly,
    Monthly,
}

impl From<RuleTypeArg> for RuleType {
    fn from(arg: RuleTypeArg) -> Self {
        match arg {
            RuleTypeArg::Daily => RuleType::Daily,
            RuleTypeArg::Weekly => RuleType::Weekly,
            RuleTypeArg::Monthly => RuleType::Monthly,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum RuleKindArg {
    #[value(name = "weekly")]
    Weekly,
    #[value(name = "monthly_day")]
    MonthlyDay,
    #[value(name = "monthly_nth_weekday")]
    MonthlyNthWeekday,
}

impl From<RuleKindArg> for RuleKind {
    fn from(arg: RuleKindArg) -> Self {
        match arg {
            RuleKindArg::Weekly => RuleKind::Weekly,
            RuleKindArg::MonthlyDay => RuleKind::MonthlyDay,
            RuleKindArg::MonthlyNthWeekday => RuleKind::MonthlyNthWeekday,
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli, RuleKindArg};

    #[test]
    fn parses_last_weekday_rule() {
        let cli = GlobalCli::try_parse_from([
            "opsched",
            "rule-add",
            "--kind",
            "monthly_nth_weekday",
            "--nth",
            "-1",
            "--weekday",
            "5",
            "--start",
            "10:00",
            "--end",
            "14:00",
        ])
        .expect("parse args");

        match cli.command {
            Some(Command::RuleAdd { kind, nth, weekday, .. }) => {
                assert!(matches!(kind, RuleKindArg::MonthlyNthWeekday));
                assert_eq!(nth, Some(-1));
                assert_eq!(weekday, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = GlobalCli::try_parse_from([
            "opsched",
            "preview",
            "--days",
            "7",
            "-vv",
            "--rc",
            "color=off",
        ])
        .expect("parse args");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "color");
    }
}
