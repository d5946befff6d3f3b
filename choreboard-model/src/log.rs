//! Immutable audit log entries.
//!
//! Every action against a task appends a log entry. Entries are never
//! mutated with one sanctioned exception: when a verifier (or the vote
//! tally) decides on a claim, the decision is attached to the originating
//! claim entry via the optional `decision*` fields. The deadline snapshot
//! taken at claim time is what the lazy point-attribution rule compares
//! the approval time against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{LogId, MemberId, TaskId};
use crate::workflow::Decision;

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    /// A member asserted they completed the task.
    Claim,
    /// A verification was approved.
    Approve,
    /// A verification was rejected.
    Reject,
    /// A ballot was cast during conflict resolution.
    Vote,
    /// A member asked for the task to be deleted.
    DeleteRequest,
    /// A deletion request was seconded.
    DeleteApprove,
    /// A deletion request was turned down.
    DeleteReject,
    /// A member took over someone else's task.
    Takeover,
    /// System-authored summary of a vote tally.
    Tally,
}

impl std::fmt::Display for ActionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claim => write!(f, "claim"),
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::Vote => write!(f, "vote"),
            Self::DeleteRequest => write!(f, "delete_request"),
            Self::DeleteApprove => write!(f, "delete_approve"),
            Self::DeleteReject => write!(f, "delete_reject"),
            Self::Takeover => write!(f, "takeover"),
            Self::Tally => write!(f, "tally"),
        }
    }
}

/// One audit record of an action taken against a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique log entry identifier.
    pub id: LogId,
    /// Task the action was taken against.
    pub task_id: TaskId,
    /// Member who acted (the system author for tally entries).
    pub user_id: MemberId,
    /// What happened.
    pub action: ActionTag,
    /// Free-text note from the actor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// For takeover claims: the member the task was assigned to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_assignee_id: Option<MemberId>,
    /// For takeover claims: the member who actually did the work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_completer_id: Option<MemberId>,
    /// `true` when this claim completed another member's task.
    #[serde(default)]
    pub is_swap: bool,
    /// Verdict attached to a claim entry by its verifier or the tally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Who attached the verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<MemberId>,
    /// When the verdict was attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    /// The task's deadline at the moment the claim was filed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_at_claim: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Builds a plain entry with only the required fields set.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        user_id: MemberId,
        action: ActionTag,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LogId::new(),
            task_id,
            user_id,
            action,
            notes: None,
            timestamp,
            original_assignee_id: None,
            actual_completer_id: None,
            is_swap: false,
            decision: None,
            decided_by: None,
            decided_at: None,
            deadline_at_claim: None,
        }
    }

    /// Attaches a verifier's (or the tally's) verdict to this entry.
    pub fn attach_decision(
        &mut self,
        decision: Decision,
        decided_by: MemberId,
        decided_at: DateTime<Utc>,
    ) {
        self.decision = Some(decision);
        self.decided_by = Some(decided_by);
        self.decided_at = Some(decided_at);
    }
}
