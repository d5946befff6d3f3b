//! Schedule descriptors and the definition-time shortcut grammar.
//!
//! A canonical descriptor is either a five-field cron expression or an
//! interval marker (`every_N_days`). The natural-language shortcuts
//! (`daily at 20:00`, `saturday at 10:00`, `by friday`) are syntactic
//! sugar resolved exactly once, at task definition time, into a canonical
//! descriptor or a one-off due date.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::recurrence::{CronExpr, next_deadline};

/// Errors from parsing or evaluating schedule descriptors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The schedule text was empty.
    #[error("schedule expression is empty")]
    Empty,
    /// A cron expression could not be parsed.
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidCron {
        /// The offending expression.
        expr: String,
        /// Why it was rejected.
        reason: String,
    },
    /// An interval marker could not be parsed.
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    /// The text matched neither a shortcut nor a canonical descriptor.
    #[error("unrecognized schedule {0:?}")]
    Unrecognized(String),
    /// A cron expression has no fire time within the search horizon.
    #[error("no upcoming fire time for {0:?}")]
    NoUpcomingFire(String),
}

/// Canonical schedule descriptor attached to a recurring task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Fires per a five-field cron expression.
    Cron(CronExpr),
    /// Fires every N days, truncated to midnight of the target day.
    IntervalDays {
        /// Number of days between deadlines; at least 1.
        every: u32,
    },
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cron(expr) => write!(f, "{expr}"),
            Self::IntervalDays { every } => write!(f, "every_{every}_days"),
        }
    }
}

impl std::str::FromStr for Schedule {
    type Err = ScheduleError;

    /// Parses a canonical descriptor: `every_N_days` or five-field cron.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if let Some(rest) = trimmed.strip_prefix("every_") {
            let days = rest
                .strip_suffix("_days")
                .or_else(|| rest.strip_suffix("_day"))
                .ok_or_else(|| ScheduleError::InvalidInterval(trimmed.to_string()))?;
            let every: u32 = days
                .parse()
                .map_err(|_| ScheduleError::InvalidInterval(trimmed.to_string()))?;
            if every == 0 {
                return Err(ScheduleError::InvalidInterval(trimmed.to_string()));
            }
            return Ok(Self::IntervalDays { every });
        }
        CronExpr::parse(trimmed).map(Self::Cron)
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of resolving schedule text at task definition time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchedule {
    /// Canonical descriptor for recurring tasks; `None` for one-offs.
    pub schedule: Option<Schedule>,
    /// The first deadline, when one could be derived.
    pub deadline: Option<DateTime<Utc>>,
}

/// Resolves user-facing schedule text into a canonical descriptor and the
/// initial deadline, anchored at `now`.
///
/// Accepted forms:
/// - `daily at HH:MM` / `every day at HH:MM`
/// - `<weekday> at HH:MM` / `every <weekday> at HH:MM`
/// - `by <weekday>` — one-off due date (end of that day), no recurrence
/// - `every N days` and the canonical `every_N_days`
/// - a raw five-field cron expression
///
/// # Errors
///
/// Returns [`ScheduleError`] when the text matches none of the accepted
/// forms or a derived cron expression is unsatisfiable.
pub fn resolve_definition(input: &str, now: DateTime<Utc>) -> Result<ResolvedSchedule, ScheduleError> {
    let text = input.trim().to_lowercase();
    if text.is_empty() {
        return Err(ScheduleError::Empty);
    }

    if let Some(rest) = text.strip_prefix("by ") {
        let weekday = parse_weekday(rest.trim())
            .ok_or_else(|| ScheduleError::Unrecognized(input.trim().to_string()))?;
        return Ok(ResolvedSchedule {
            schedule: None,
            deadline: Some(upcoming_end_of_day(weekday, now)),
        });
    }

    if let Some(schedule) = parse_shortcut(&text)? {
        let deadline = next_deadline(&schedule, now)?;
        return Ok(ResolvedSchedule {
            schedule: Some(schedule),
            deadline: Some(deadline),
        });
    }

    let schedule: Schedule = text.parse()?;
    let deadline = next_deadline(&schedule, now)?;
    Ok(ResolvedSchedule {
        schedule: Some(schedule),
        deadline: Some(deadline),
    })
}

/// Tries the recurring shortcut forms; `Ok(None)` means "not a shortcut".
fn parse_shortcut(text: &str) -> Result<Option<Schedule>, ScheduleError> {
    let body = text.strip_prefix("every ").unwrap_or(text);

    // "every N days"
    let words: Vec<&str> = body.split_whitespace().collect();
    if words.len() == 2 && (words[1] == "days" || words[1] == "day") {
        if let Ok(every) = words[0].parse::<u32>() {
            if every == 0 {
                return Err(ScheduleError::InvalidInterval(text.to_string()));
            }
            return Ok(Some(Schedule::IntervalDays { every }));
        }
    }

    // "daily at HH:MM" / "day at HH:MM" / "<weekday> at HH:MM"
    if let Some((subject, time)) = body.split_once(" at ") {
        let (hour, minute) = parse_hhmm(time.trim())
            .ok_or_else(|| ScheduleError::Unrecognized(text.to_string()))?;
        let subject = subject.trim();
        if subject == "daily" || subject == "day" {
            return Ok(Some(cron_schedule(&format!("{minute} {hour} * * *"))));
        }
        if let Some(weekday) = parse_weekday(subject) {
            return Ok(Some(cron_schedule(&format!(
                "{minute} {hour} * * {weekday}"
            ))));
        }
        return Err(ScheduleError::Unrecognized(text.to_string()));
    }

    Ok(None)
}

/// Builds a cron schedule from an expression assembled by this module.
/// The inputs are validated numbers, so parsing cannot fail.
fn cron_schedule(expr: &str) -> Schedule {
    match CronExpr::parse(expr) {
        Ok(parsed) => Schedule::Cron(parsed),
        // Unreachable for generated expressions; keep a satisfiable default.
        Err(_) => Schedule::IntervalDays { every: 1 },
    }
}

/// Parses `HH:MM` (or `H:MM`) into hour and minute.
fn parse_hhmm(text: &str) -> Option<(u32, u32)> {
    let (hour, minute) = text.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// Maps weekday names and three-letter abbreviations to cron numbering
/// (0 = Sunday).
fn parse_weekday(text: &str) -> Option<u32> {
    match text {
        "sunday" | "sun" => Some(0),
        "monday" | "mon" => Some(1),
        "tuesday" | "tue" => Some(2),
        "wednesday" | "wed" => Some(3),
        "thursday" | "thu" => Some(4),
        "friday" | "fri" => Some(5),
        "saturday" | "sat" => Some(6),
        _ => None,
    }
}

/// The next end-of-day (23:59) instant falling on the given weekday,
/// strictly after `now`.
fn upcoming_end_of_day(weekday: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.weekday().num_days_from_sunday();
    let days_ahead = i64::from((weekday + 7 - today) % 7);
    let date = now.date_naive() + Duration::days(days_ahead);
    let end = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN);
    let candidate = Utc.from_utc_datetime(&date.and_time(end));
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}
