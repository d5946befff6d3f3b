//! Ballots for conflict resolution and weekly takeover counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BallotId, CounterId, MemberId, TaskId, WorkflowId};

/// One member's choice on a conflicted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    /// Ballot issued but not yet cast.
    Pending,
    /// The claim should stand.
    Yes,
    /// The claim should be rejected.
    No,
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
        }
    }
}

/// One eligible voter's ballot for one conflict episode.
///
/// `episode_id` is the verification workflow whose rejection opened the
/// conflict; it keys ballots to a single episode so a task that re-enters
/// conflict later starts from a clean slate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Unique ballot identifier.
    pub id: BallotId,
    /// Conflicted task being voted on.
    pub task_id: TaskId,
    /// The rejected verification workflow that opened this episode.
    pub episode_id: WorkflowId,
    /// The eligible voter.
    pub voter_id: MemberId,
    /// Current choice.
    pub choice: VoteChoice,
    /// When the ballot was issued or last updated.
    pub timestamp: DateTime<Utc>,
}

/// Weekly takeover counter for one member.
///
/// Unique per (member, week start); `week_start` is Monday 00:00 UTC,
/// computed by calendar arithmetic rather than a rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeoverCounter {
    /// Unique counter row identifier.
    pub id: CounterId,
    /// Member the counter belongs to.
    pub member_id: MemberId,
    /// Monday 00:00 UTC of the week this counter covers.
    pub week_start: DateTime<Utc>,
    /// Takeovers recorded so far this week.
    pub count: u32,
}
