//! Weekly takeover quota.
//!
//! A takeover is completing a shared task assigned to someone else. Each
//! member gets a fixed number per calendar week, counted against Monday
//! 00:00 UTC boundaries rather than a rolling window. Counters are
//! upserted per (member, week); old weeks are simply left behind.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use thiserror::Error;

use choreboard_model::{CounterId, Filter, MemberId, TakeoverCounter};

use crate::store::{Store, StoreError};

/// Errors from the takeover quota.
#[derive(Debug, Error)]
pub enum TakeoverError {
    /// The member has exhausted this week's quota.
    #[error("{member} has used all {limit} takeovers this week")]
    LimitExceeded {
        /// Member at the limit.
        member: MemberId,
        /// The configured weekly limit.
        limit: u32,
    },
    /// Store adapter failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeoverCheck {
    /// Whether another takeover is currently allowed.
    pub allowed: bool,
    /// Takeovers already recorded this week.
    pub used: u32,
    /// The configured weekly limit.
    pub limit: u32,
    /// Human-readable explanation of a denial, `None` while allowed.
    pub reason: Option<String>,
}

/// Monday 00:00 UTC of the week containing `now`.
#[must_use]
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_into_week = i64::from(now.weekday().num_days_from_monday());
    let monday = now.date_naive() - Duration::days(days_into_week);
    monday
        .and_hms_opt(0, 0, 0)
        .map_or(now, |naive| naive.and_utc())
}

/// Enforces and records the weekly takeover quota.
pub struct TakeoverService<S> {
    store: Arc<S>,
    weekly_limit: u32,
}

impl<S: Store> TakeoverService<S> {
    /// Creates the service with the configured weekly limit.
    pub fn new(store: Arc<S>, weekly_limit: u32) -> Self {
        Self {
            store,
            weekly_limit,
        }
    }

    /// Checks whether `member` may record another takeover this week.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn can_take_over(
        &self,
        member: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<TakeoverCheck, TakeoverError> {
        let used = self
            .counter_for(member, week_start(now))?
            .map_or(0, |counter| counter.count);
        let allowed = used < self.weekly_limit;
        let reason = (!allowed).then(|| {
            format!(
                "{member} has used all {} takeovers this week",
                self.weekly_limit
            )
        });
        Ok(TakeoverCheck {
            allowed,
            used,
            limit: self.weekly_limit,
            reason,
        })
    }

    /// Records one takeover, upserting the member's counter for the
    /// current week.
    ///
    /// # Errors
    ///
    /// Returns [`TakeoverError::LimitExceeded`] when the quota is already
    /// exhausted.
    pub fn record_take_over(
        &self,
        member: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<TakeoverCounter, TakeoverError> {
        let week = week_start(now);
        let counter = match self.counter_for(member, week)? {
            Some(mut counter) => {
                if counter.count >= self.weekly_limit {
                    return Err(TakeoverError::LimitExceeded {
                        member: member.clone(),
                        limit: self.weekly_limit,
                    });
                }
                counter.count += 1;
                self.store.update(&counter)?;
                counter
            }
            None => {
                if self.weekly_limit == 0 {
                    return Err(TakeoverError::LimitExceeded {
                        member: member.clone(),
                        limit: 0,
                    });
                }
                let counter = TakeoverCounter {
                    id: CounterId::new(),
                    member_id: member.clone(),
                    week_start: week,
                    count: 1,
                };
                self.store.create(&counter)?;
                counter
            }
        };
        tracing::debug!(
            member = %member,
            used = counter.count,
            limit = self.weekly_limit,
            "takeover recorded"
        );
        Ok(counter)
    }

    fn counter_for(
        &self,
        member: &MemberId,
        week: DateTime<Utc>,
    ) -> Result<Option<TakeoverCounter>, TakeoverError> {
        // AutoSi matches how chrono's serde renders timestamps, so the
        // string comparison in the filter lines up with stored values.
        let filter = Filter::new()
            .eq("member_id", member.as_str())
            .eq(
                "week_start",
                week.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            );
        Ok(self.store.get_first(&filter)?)
    }
}
