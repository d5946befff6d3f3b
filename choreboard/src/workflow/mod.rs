//! The generic approval-workflow engine.
//!
//! Creates and resolves pending multi-party decisions (completion
//! verification, deletion seconding). A workflow's resolution is the
//! single source of truth for its outcome; callers react to
//! approved/rejected by driving the task state machine. The engine itself
//! never touches task state.
//!
//! The `pending`-status guard doubles as the mutual-exclusion point for
//! concurrent resolutions: only the first resolution to observe `pending`
//! succeeds, a second attempt reads the terminal status and fails cleanly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use choreboard_model::{
    Decision, Filter, MemberId, TaskId, Workflow, WorkflowId, WorkflowMetadata, WorkflowStatus,
    WorkflowType,
};

use crate::store::{Sort, Store, StoreError};

/// Default hours until a pending workflow may be expired.
pub const DEFAULT_EXPIRY_HOURS: i64 = 48;

/// Errors from workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The referenced workflow does not exist.
    #[error("workflow not found: {0}")]
    NotFound(WorkflowId),
    /// The workflow was already resolved, expired, or cancelled.
    #[error("workflow {id} is {status}, not pending")]
    NotPending {
        /// Workflow involved.
        id: WorkflowId,
        /// Status observed.
        status: WorkflowStatus,
    },
    /// The workflow's expiry time has passed.
    #[error("workflow {0} has expired")]
    Expired(WorkflowId),
    /// Requesters may never resolve their own request, regardless of type.
    #[error("requester cannot resolve their own request")]
    SelfApproval,
    /// A pending workflow of this type already exists for the target.
    #[error("a pending {kind} workflow already exists for task {target}")]
    DuplicatePending {
        /// Workflow type.
        kind: WorkflowType,
        /// Target task.
        target: TaskId,
    },
    /// Store adapter failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters for opening a workflow.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    /// What kind of decision is being asked for.
    pub kind: WorkflowType,
    /// Member raising the request.
    pub requester: MemberId,
    /// Denormalized display name of the requester.
    pub requester_name: String,
    /// Task the request is about.
    pub target_id: TaskId,
    /// Denormalized title of the target task.
    pub target_title: String,
    /// Hours until expiry; defaults to [`DEFAULT_EXPIRY_HOURS`].
    pub expiry_hours: Option<i64>,
    /// Type-specific metadata.
    pub metadata: WorkflowMetadata,
}

/// The single, shared self-approval guard. Every resolution path runs
/// through this so the invariant cannot be missed at one call site.
///
/// # Errors
///
/// Returns [`WorkflowError::SelfApproval`] when resolver and requester
/// are the same member.
pub fn ensure_not_self(requester: &MemberId, resolver: &MemberId) -> Result<(), WorkflowError> {
    if requester == resolver {
        Err(WorkflowError::SelfApproval)
    } else {
        Ok(())
    }
}

/// Generic create/resolve/expire lifecycle for approval requests.
pub struct WorkflowEngine<S> {
    store: Arc<S>,
}

impl<S: Store> WorkflowEngine<S> {
    /// Creates the engine over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Opens a new pending workflow.
    ///
    /// At most one pending workflow may exist per (type, target) pair.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::DuplicatePending`] when one already does,
    /// or a store error.
    pub fn create(
        &self,
        request: WorkflowRequest,
        now: DateTime<Utc>,
    ) -> Result<Workflow, WorkflowError> {
        let duplicate = Filter::new()
            .eq("type", request.kind.to_string())
            .eq("target_id", request.target_id.to_string())
            .eq("status", WorkflowStatus::Pending.to_string());
        if self.store.get_first::<Workflow>(&duplicate)?.is_some() {
            return Err(WorkflowError::DuplicatePending {
                kind: request.kind,
                target: request.target_id,
            });
        }

        let expiry_hours = request.expiry_hours.unwrap_or(DEFAULT_EXPIRY_HOURS);
        let workflow = Workflow {
            id: WorkflowId::new(),
            kind: request.kind,
            status: WorkflowStatus::Pending,
            requester_user_id: request.requester,
            requester_name: request.requester_name,
            target_id: request.target_id,
            target_title: request.target_title,
            created_at: now,
            expires_at: now + Duration::hours(expiry_hours),
            resolver_user_id: None,
            resolver_name: None,
            resolved_at: None,
            reason: None,
            metadata: request.metadata,
        };
        self.store.create(&workflow)?;
        tracing::debug!(workflow = %workflow.id, kind = %workflow.kind, "workflow opened");
        Ok(workflow)
    }

    /// Fetches a workflow by id.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::NotFound`] when absent.
    pub fn get(&self, id: &WorkflowId) -> Result<Workflow, WorkflowError> {
        match self.store.get::<Workflow>(&id.to_string()) {
            Ok(workflow) => Ok(workflow),
            Err(StoreError::NotFound { .. }) => Err(WorkflowError::NotFound(id.clone())),
            Err(other) => Err(other.into()),
        }
    }

    /// Resolves a pending workflow exactly once.
    ///
    /// # Errors
    ///
    /// Fails when the workflow does not exist, is not pending, has passed
    /// its expiry time, or when `resolver` is the requester.
    pub fn resolve(
        &self,
        id: &WorkflowId,
        resolver: &MemberId,
        resolver_name: &str,
        decision: Decision,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Workflow, WorkflowError> {
        let mut workflow = self.get(id)?;
        if !workflow.is_pending() {
            return Err(WorkflowError::NotPending {
                id: id.clone(),
                status: workflow.status,
            });
        }
        // Authorization first: an unauthorized caller never learns (or
        // triggers) the expiry transition.
        ensure_not_self(&workflow.requester_user_id, resolver)?;
        if workflow.expires_at <= now {
            // Unswept but past expiry: flip it rather than let it resolve.
            workflow.status = WorkflowStatus::Expired;
            self.store.update(&workflow)?;
            return Err(WorkflowError::Expired(id.clone()));
        }

        workflow.status = decision.as_status();
        workflow.resolver_user_id = Some(resolver.clone());
        workflow.resolver_name = Some(resolver_name.to_string());
        workflow.resolved_at = Some(now);
        workflow.reason = reason.map(ToString::to_string);
        self.store.update(&workflow)?;
        tracing::debug!(
            workflow = %workflow.id,
            resolver = %resolver,
            status = %workflow.status,
            "workflow resolved"
        );
        Ok(workflow)
    }

    /// All pending workflows, optionally restricted to one type, oldest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn list_pending(&self, kind: Option<WorkflowType>) -> Result<Vec<Workflow>, WorkflowError> {
        let mut filter = Filter::new().eq("status", WorkflowStatus::Pending.to_string());
        if let Some(kind) = kind {
            filter = filter.eq("type", kind.to_string());
        }
        Ok(self
            .store
            .list(&filter, Some(&Sort::asc("created_at")), None)?)
    }

    /// Pending workflows `user` can act on: everything not requested by
    /// them.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn list_actionable(&self, user: &MemberId) -> Result<Vec<Workflow>, WorkflowError> {
        let filter = Filter::new()
            .eq("status", WorkflowStatus::Pending.to_string())
            .ne("requester_user_id", user.as_str());
        Ok(self
            .store
            .list(&filter, Some(&Sort::asc("created_at")), None)?)
    }

    /// Resolves each id independently, silently skipping any that fail
    /// validation, and returns the successfully resolved subset.
    pub fn batch_resolve(
        &self,
        ids: &[WorkflowId],
        resolver: &MemberId,
        resolver_name: &str,
        decision: Decision,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<Workflow> {
        let mut resolved = Vec::new();
        for id in ids {
            match self.resolve(id, resolver, resolver_name, decision, reason, now) {
                Ok(workflow) => resolved.push(workflow),
                Err(error) => {
                    tracing::debug!(workflow = %id, %error, "batch resolve skipped entry");
                }
            }
        }
        resolved
    }

    /// Sweeps all pending workflows whose expiry time has passed, flipping
    /// them to `expired`. Idempotent: a second run finds nothing pending.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Workflow>, WorkflowError> {
        let pending = self.list_pending(None)?;
        let mut expired = Vec::new();
        for mut workflow in pending {
            if workflow.expires_at <= now {
                workflow.status = WorkflowStatus::Expired;
                self.store.update(&workflow)?;
                tracing::debug!(workflow = %workflow.id, "workflow expired");
                expired.push(workflow);
            }
        }
        Ok(expired)
    }
}
