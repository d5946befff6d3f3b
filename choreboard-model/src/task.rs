//! The task record and its lifecycle state enum.
//!
//! A task is a unit of recurring or one-off obligation. It is created in
//! [`TaskState::Todo`] and only ever mutated through the lifecycle state
//! machine in the `choreboard` crate; the shapes here are pure data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MemberId, TaskId};
use crate::schedule::Schedule;

/// Whether a task belongs to the whole group or to one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Visible to and claimable by every member.
    Shared,
    /// Tracked for a single member only.
    Personal,
}

/// How a claimed completion of this task must be verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPolicy {
    /// No verification: a claim completes the task immediately.
    None,
    /// Any other member may verify.
    Peer,
    /// Verification is expected from the member's partner.
    Partner,
}

/// Lifecycle state of a task.
///
/// `Archived` is terminal. `Deadlock` requires out-of-band manual
/// resolution and is only reachable from `Conflict` via a tied vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Open and waiting to be done.
    Todo,
    /// A completion claim is awaiting verification.
    PendingVerification,
    /// A rejected claim has been escalated to a group vote.
    Conflict,
    /// A tied vote; requires manual administrative resolution.
    Deadlock,
    /// Done (one-off tasks stay here; recurring tasks reset to `Todo`).
    Completed,
    /// Soft-deleted; accepts no further transitions.
    Archived,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::PendingVerification => write!(f, "pending_verification"),
            Self::Conflict => write!(f, "conflict"),
            Self::Deadlock => write!(f, "deadlock"),
            Self::Completed => write!(f, "completed"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// A unit of recurring or one-off obligation.
///
/// Field names match the persisted shape expected by external store
/// adapters; see the crate-level documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Short human-readable title.
    pub title: String,
    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Member who defined the task, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<MemberId>,
    /// Member currently responsible; unassigned tasks are allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<MemberId>,
    /// Shared or personal scope.
    pub scope: Scope,
    /// How completions of this task are verified.
    pub verification: VerificationPolicy,
    /// Current lifecycle state.
    pub current_state: TaskState,
    /// Canonical schedule descriptor; `None` for one-off tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    /// Next deadline, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl Task {
    /// Returns `true` if the task recurs (has a schedule descriptor).
    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        self.schedule.is_some()
    }
}
