//! Point attribution and the leaderboard.
//!
//! Points exist only as a projection over the audit log; nothing stores a
//! running score. One approved claim is one point, credited by the swap
//! rule: a takeover completed before the deadline the task had at claim
//! time still credits the original assignee (they are presumed to have
//! been about to do it), while a takeover after that deadline credits the
//! member who actually did the work.

use std::collections::BTreeMap;
use std::sync::Arc;

use choreboard_model::{Decision, Filter, LogEntry, MemberId};

use crate::store::{Store, StoreError};

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Member credited.
    pub member_id: MemberId,
    /// Approved completions credited to them.
    pub points: u32,
}

/// Who an approved claim entry credits.
///
/// Swap entries missing a deadline snapshot count as on-time: a task with
/// no deadline cannot be completed late.
#[must_use]
pub fn credit_for(entry: &LogEntry) -> MemberId {
    if !entry.is_swap {
        return entry.user_id.clone();
    }
    let on_time = match (entry.decided_at, entry.deadline_at_claim) {
        (Some(decided_at), Some(deadline)) => decided_at <= deadline,
        _ => true,
    };
    let credited = if on_time {
        entry.original_assignee_id.as_ref()
    } else {
        entry.actual_completer_id.as_ref()
    };
    credited.unwrap_or(&entry.user_id).clone()
}

/// Builds the leaderboard from the log.
pub struct LeaderboardService<S> {
    store: Arc<S>,
}

impl<S: Store> LeaderboardService<S> {
    /// Creates the service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Scans approved claims and returns standings, most points first.
    /// Ties break on member id so the ordering is stable.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn build(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let filter = Filter::new()
            .eq("action", "claim")
            .eq("decision", Decision::Approved.to_string());
        let approved: Vec<LogEntry> = self.store.list(&filter, None, None)?;

        let mut points: BTreeMap<MemberId, u32> = BTreeMap::new();
        for entry in &approved {
            *points.entry(credit_for(entry)).or_default() += 1;
        }

        let mut standings: Vec<LeaderboardEntry> = points
            .into_iter()
            .map(|(member_id, points)| LeaderboardEntry { member_id, points })
            .collect();
        standings.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.member_id.cmp(&b.member_id)));
        Ok(standings)
    }
}
