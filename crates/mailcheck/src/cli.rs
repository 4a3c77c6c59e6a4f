//! Command-line parsing.

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{DateTime, NaiveDate, Utc};

pub const USAGE: &str = "\
Usage:
  mailcheck <config.json>                               poll every mailbox until Ctrl-C
  mailcheck <config.json> once                          check every mailbox once and exit
  mailcheck <config.json> unprocess <user> <from> <to>  forget deliveries in a date range

Dates are RFC 3339 timestamps or YYYY-MM-DD (a bare <to> date covers the whole day).";

/// What to do once the configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run,
    Once,
    Unprocess {
        user: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub config: PathBuf,
    pub action: Action,
}

/// Parse arguments, excluding the program name.
pub fn parse<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(config) = args.next() else {
        bail!("missing configuration file");
    };

    let action = match args.next().as_deref() {
        None => Action::Run,
        Some("once") => Action::Once,
        Some("unprocess") => {
            let (Some(user), Some(from), Some(to)) = (args.next(), args.next(), args.next())
            else {
                bail!("unprocess needs <user> <from> <to>");
            };
            let from = parse_date(&from, false).context("invalid <from>")?;
            let to = parse_date(&to, true).context("invalid <to>")?;
            Action::Unprocess { user, from, to }
        }
        Some(other) => bail!("unknown command: {other}"),
    };

    if let Some(extra) = args.next() {
        bail!("unexpected argument: {extra}");
    }

    Ok(Command {
        config: PathBuf::from(config),
        action,
    })
}

/// RFC 3339, or a calendar date taken as the start (or end) of that UTC day.
fn parse_date(value: &str, end_of_day: bool) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("expected RFC 3339 or YYYY-MM-DD, got {value:?}"))?;
    let time = if end_of_day {
        date.and_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .with_context(|| format!("invalid date: {value}"))
}
