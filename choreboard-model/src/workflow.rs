//! The workflow record: a pending multi-party decision.
//!
//! Workflows represent anything that needs a second member's sign-off
//! (completion verification, deletion approval). They are created `pending`,
//! mutated exactly once by resolution or the expiry sweep, and never
//! deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{LogId, MemberId, TaskId, WorkflowId};

/// What kind of decision a workflow asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Seconding of a deletion request.
    DeletionApproval,
    /// Verification of a claimed completion.
    Verification,
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeletionApproval => write!(f, "deletion_approval"),
            Self::Verification => write!(f, "verification"),
        }
    }
}

/// Status of a workflow. `Pending` is the only mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Awaiting resolution by another member.
    Pending,
    /// Resolved positively.
    Approved,
    /// Resolved negatively.
    Rejected,
    /// The expiry sweep flipped it after the deadline passed.
    Expired,
    /// Withdrawn before resolution.
    Cancelled,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A resolver's verdict on a pending workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Accept the request.
    Approved,
    /// Turn the request down.
    Rejected,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl Decision {
    /// The workflow status this decision resolves to.
    #[must_use]
    pub const fn as_status(self) -> WorkflowStatus {
        match self {
            Self::Approved => WorkflowStatus::Approved,
            Self::Rejected => WorkflowStatus::Rejected,
        }
    }
}

/// Type-specific workflow metadata.
///
/// All fields are optional; verification workflows carry the swap flag and
/// a back-reference to the claim log so an approval can attach its decision
/// to the originating claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowMetadata {
    /// `true` when the claim was a takeover of someone else's task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_swap: Option<bool>,
    /// The claim log entry that opened this verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_log_id: Option<LogId>,
}

/// A pending multi-party decision over a target task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier.
    pub id: WorkflowId,
    /// What kind of decision this is.
    #[serde(rename = "type")]
    pub kind: WorkflowType,
    /// Current status.
    pub status: WorkflowStatus,
    /// Member who raised the request.
    pub requester_user_id: MemberId,
    /// Denormalized display name of the requester.
    pub requester_name: String,
    /// Task this workflow decides about.
    pub target_id: TaskId,
    /// Denormalized title of the target task.
    pub target_title: String,
    /// When the workflow was created.
    pub created_at: DateTime<Utc>,
    /// When the expiry sweep may flip it to `expired`.
    pub expires_at: DateTime<Utc>,
    /// Member who resolved it, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver_user_id: Option<MemberId>,
    /// Denormalized display name of the resolver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver_name: Option<String>,
    /// When it was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Free-text reason given at resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Type-specific metadata.
    #[serde(default, skip_serializing_if = "WorkflowMetadata::is_empty")]
    pub metadata: WorkflowMetadata,
}

impl WorkflowMetadata {
    /// Returns `true` when no metadata field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_swap.is_none() && self.claim_log_id.is_none()
    }
}

impl Workflow {
    /// Returns `true` if the workflow can still be resolved.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == WorkflowStatus::Pending
    }
}
