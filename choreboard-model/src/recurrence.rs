//! The recurrence calculator: schedule descriptor + anchor → next deadline.
//!
//! Pure calendar arithmetic with no store access. Cron next-fire times are
//! computed strictly after the anchor; interval descriptors add N days and
//! truncate to midnight. Callers implement "floating" semantics by passing
//! the completion time as the anchor.

use chrono::{DateTime, Datelike, Days, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::schedule::{Schedule, ScheduleError};

/// How far ahead `next_after` searches before giving up. Generous enough
/// for any satisfiable five-field expression (leap-day schedules fire at
/// least once every four years).
const SEARCH_HORIZON_DAYS: u64 = 366 * 5;

/// Set of permitted values for one cron field, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldMask {
    mask: u64,
    /// `true` when the field was `*` (unrestricted).
    any: bool,
}

impl FieldMask {
    fn contains(self, value: u32) -> bool {
        value < 64 && self.mask & (1 << value) != 0
    }
}

/// A parsed five-field cron expression: minute, hour, day-of-month, month,
/// day-of-week (0 and 7 both mean Sunday).
///
/// Supports numbers, `*`, lists, ranges, and steps in every field. When
/// both day fields are restricted the standard OR rule applies: a day
/// matches if either field matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: FieldMask,
    hours: FieldMask,
    dom: FieldMask,
    months: FieldMask,
    dow: FieldMask,
}

impl CronExpr {
    /// Parses a five-field cron expression.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidCron`] when the expression does not
    /// have five fields or a field is out of range or malformed.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let invalid = |reason: &str| ScheduleError::InvalidCron {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid("expected five fields"));
        }
        Ok(Self {
            source: fields.join(" "),
            minutes: parse_field(fields[0], 0, 59, false).map_err(|r| invalid(&r))?,
            hours: parse_field(fields[1], 0, 23, false).map_err(|r| invalid(&r))?,
            dom: parse_field(fields[2], 1, 31, false).map_err(|r| invalid(&r))?,
            months: parse_field(fields[3], 1, 12, false).map_err(|r| invalid(&r))?,
            dow: parse_field(fields[4], 0, 6, true).map_err(|r| invalid(&r))?,
        })
    }

    /// The normalized source expression.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Computes the next fire time strictly after `anchor`.
    ///
    /// Returns `None` when no day within the search horizon satisfies the
    /// expression (e.g. a day-of-month that no permitted month has).
    #[must_use]
    pub fn next_after(&self, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = anchor
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(anchor)
            + chrono::Duration::minutes(1);
        let start_date = start.date_naive();

        for day_offset in 0..=SEARCH_HORIZON_DAYS {
            let date = start_date.checked_add_days(Days::new(day_offset))?;
            if !self.months.contains(date.month()) || !self.day_matches(date) {
                continue;
            }
            let same_day = day_offset == 0;
            for hour in 0..24 {
                if !self.hours.contains(hour) || (same_day && hour < start.hour()) {
                    continue;
                }
                for minute in 0..60 {
                    if !self.minutes.contains(minute)
                        || (same_day && hour == start.hour() && minute < start.minute())
                    {
                        continue;
                    }
                    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                    return Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)));
                }
            }
        }
        None
    }

    fn day_matches(&self, date: chrono::NaiveDate) -> bool {
        let dom_hit = self.dom.contains(date.day());
        let dow_hit = self.dow.contains(date.weekday().num_days_from_sunday());
        match (self.dom.any, self.dow.any) {
            // Both unrestricted: every day matches.
            (true, true) => true,
            (true, false) => dow_hit,
            (false, true) => dom_hit,
            // Both restricted: standard cron OR rule.
            (false, false) => dom_hit || dow_hit,
        }
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Parses one cron field into a bitmask.
///
/// `allow_seven` maps a 7 in the day-of-week field back to Sunday (0).
fn parse_field(spec: &str, min: u32, max: u32, allow_seven: bool) -> Result<FieldMask, String> {
    let mut mask = 0u64;
    let any = spec == "*";

    for part in spec.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step in {part:?}"))?;
                if step == 0 {
                    return Err(format!("zero step in {part:?}"));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| format!("bad range in {part:?}"))?;
            let hi: u32 = hi.parse().map_err(|_| format!("bad range in {part:?}"))?;
            (lo, hi)
        } else {
            let value: u32 = range
                .parse()
                .map_err(|_| format!("bad value in {part:?}"))?;
            // A bare value with a step means "from value to max".
            if part.contains('/') {
                (value, max)
            } else {
                (value, value)
            }
        };

        let upper = if allow_seven { max + 1 } else { max };
        if lo < min || hi > upper || lo > hi {
            return Err(format!("value out of range in {part:?}"));
        }

        let mut value = lo;
        while value <= hi {
            let normalized = if allow_seven && value == 7 { 0 } else { value };
            mask |= 1 << normalized;
            value += step;
        }
    }

    if mask == 0 {
        return Err(format!("empty field {spec:?}"));
    }
    Ok(FieldMask { mask, any })
}

/// Computes the next deadline for a schedule descriptor.
///
/// For cron descriptors this is the next fire time strictly after
/// `anchor`; for interval descriptors it is midnight of `anchor + N days`.
///
/// # Errors
///
/// Returns [`ScheduleError::NoUpcomingFire`] when a cron expression has no
/// fire time within the search horizon.
pub fn next_deadline(
    schedule: &Schedule,
    anchor: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    match schedule {
        Schedule::Cron(expr) => expr
            .next_after(anchor)
            .ok_or_else(|| ScheduleError::NoUpcomingFire(expr.source().to_string())),
        Schedule::IntervalDays { every } => {
            let date = (anchor + chrono::Duration::days(i64::from(*every))).date_naive();
            Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
        }
    }
}
