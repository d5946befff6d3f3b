//! The composition root.
//!
//! `CoreService` wires the lifecycle state machine, the workflow engine,
//! the voting subsystem, the takeover quota, and the leaderboard over one
//! shared store handle and one notification sink. It is constructed
//! explicitly at process start with injected dependencies; there is no
//! global state.
//!
//! Each high-level operation is a short sequence of single-record
//! read-modify-writes. Guards re-read state from the store, so concurrent
//! callers race on commit order rather than on stale in-memory copies.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use choreboard_model::{
    ActionTag, Decision, LogEntry, MemberId, Task, TaskId, TaskState, VerificationPolicy,
    VoteChoice, VoteRecord, Workflow, WorkflowId, WorkflowMetadata, WorkflowType,
};

use crate::config::{CoreConfig, RejectionPolicy};
use crate::conflict::{ConflictError, ConflictService, SYSTEM_AUTHOR, TallyOutcome};
use crate::leaderboard::{LeaderboardEntry, LeaderboardService};
use crate::lifecycle::{LifecycleError, TaskDefinition, TaskLifecycle};
use crate::notify::{NotificationSink, send_best_effort};
use crate::store::{Store, StoreError};
use crate::takeover::{TakeoverError, TakeoverService};
use crate::workflow::{WorkflowEngine, WorkflowError, WorkflowRequest};

/// Errors surfaced by the high-level operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A workflow of the wrong type was handed to an operation.
    #[error("workflow {workflow} is a {got} workflow, expected {expected}")]
    UnexpectedKind {
        /// Workflow involved.
        workflow: WorkflowId,
        /// Type the operation handles.
        expected: WorkflowType,
        /// Type found.
        got: WorkflowType,
    },
    /// The task must be in `todo` before its deletion can be approved.
    #[error("task {task} is {state}; only todo tasks can be deleted")]
    NotDeletable {
        /// Task involved.
        task: TaskId,
        /// State observed.
        state: TaskState,
    },
    /// Lifecycle transition failure.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Workflow engine failure.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    /// Voting subsystem failure.
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    /// Takeover quota failure.
    #[error(transparent)]
    Takeover(#[from] TakeoverError),
    /// Store adapter failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a completion claim resulted in.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// No verification required; the task completed immediately.
    AutoCompleted(Task),
    /// A verification workflow was opened and awaits another member.
    PendingVerification(Workflow),
}

/// What resolving a verification resulted in.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// Approved: the task completed (and reset, if recurring).
    Completed(Task),
    /// Rejected under the reset policy: straight back to `todo`.
    ResetToTodo(Task),
    /// Rejected under the voting policy: a conflict episode opened with
    /// these ballots.
    ConflictOpened(Vec<VoteRecord>),
}

/// Chore tracking operations over injected store, sink, and config.
pub struct CoreService<S, N> {
    store: Arc<S>,
    sink: N,
    config: CoreConfig,
    lifecycle: TaskLifecycle<S>,
    engine: WorkflowEngine<S>,
    conflict: ConflictService<S>,
    takeover: TakeoverService<S>,
    leaderboard: LeaderboardService<S>,
}

impl<S: Store, N: NotificationSink> CoreService<S, N> {
    /// Wires the subsystems over one store handle.
    pub fn new(store: Arc<S>, sink: N, config: CoreConfig) -> Self {
        Self {
            lifecycle: TaskLifecycle::new(Arc::clone(&store)),
            engine: WorkflowEngine::new(Arc::clone(&store)),
            conflict: ConflictService::new(Arc::clone(&store)),
            takeover: TakeoverService::new(Arc::clone(&store), config.takeover_weekly_limit),
            leaderboard: LeaderboardService::new(Arc::clone(&store)),
            store,
            sink,
            config,
        }
    }

    /// Defines a new task.
    ///
    /// # Errors
    ///
    /// Returns a schedule or store error.
    pub fn define_task(
        &self,
        def: TaskDefinition,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        Ok(self.lifecycle.define(def, now)?)
    }

    /// Records that `actor` completed a task and opens verification.
    ///
    /// Claiming someone else's task is a takeover: it consumes quota, is
    /// logged, and marks the claim as a swap with a snapshot of the
    /// deadline the task had at claim time. Tasks whose verification
    /// policy is `none` complete immediately.
    ///
    /// # Errors
    ///
    /// Fails when the task is not in `todo`, the takeover quota is
    /// exhausted, or on a store error.
    pub fn claim_completion(
        &self,
        task_id: &TaskId,
        actor: &MemberId,
        actor_name: &str,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, CoreError> {
        let task = self.lifecycle.fetch(task_id)?;
        // Nothing may be written until the task is known to be claimable:
        // a refused claim must not burn quota or leave log entries.
        if task.current_state != TaskState::Todo {
            return Err(CoreError::Lifecycle(LifecycleError::InvalidTransition {
                task: task_id.clone(),
                from: task.current_state,
                to: TaskState::PendingVerification,
            }));
        }
        let original_assignee = task.assigned_to.clone();
        let is_swap = original_assignee
            .as_ref()
            .is_some_and(|assignee| assignee != actor);

        if is_swap {
            self.takeover.record_take_over(actor, now)?;
            let mut takeover_log =
                LogEntry::new(task_id.clone(), actor.clone(), ActionTag::Takeover, now);
            takeover_log.original_assignee_id = original_assignee.clone();
            takeover_log.actual_completer_id = Some(actor.clone());
            self.store.create(&takeover_log)?;
        }

        let mut claim = LogEntry::new(task_id.clone(), actor.clone(), ActionTag::Claim, now);
        claim.notes = note.map(ToString::to_string);
        claim.is_swap = is_swap;
        claim.deadline_at_claim = task.deadline;
        if is_swap {
            claim.original_assignee_id = original_assignee.clone();
            claim.actual_completer_id = Some(actor.clone());
        }
        self.store.create(&claim)?;

        self.lifecycle.begin_verification(task_id)?;

        if task.verification == VerificationPolicy::None {
            // Nothing to verify: the claim is its own approval.
            self.attach_claim_verdict(
                &claim.id.to_string(),
                Decision::Approved,
                &MemberId::new(SYSTEM_AUTHOR),
                now,
            )?;
            self.lifecycle.complete(task_id, now)?;
            let task = self.lifecycle.reset_recurring(task_id)?;
            tracing::debug!(task = %task_id, actor = %actor, "claim auto-completed");
            return Ok(ClaimOutcome::AutoCompleted(task));
        }

        let workflow = self.engine.create(
            WorkflowRequest {
                kind: WorkflowType::Verification,
                requester: actor.clone(),
                requester_name: actor_name.to_string(),
                target_id: task_id.clone(),
                target_title: task.title.clone(),
                expiry_hours: Some(self.config.workflow_expiry_hours),
                metadata: WorkflowMetadata {
                    is_swap: Some(is_swap),
                    claim_log_id: Some(claim.id.clone()),
                },
            },
            now,
        )?;

        if let Some(assignee) = original_assignee.filter(|assignee| assignee != actor) {
            send_best_effort(
                &self.sink,
                &assignee,
                &format!("{actor_name} claimed your task \"{}\"", task.title),
            );
        }
        tracing::debug!(task = %task_id, actor = %actor, workflow = %workflow.id, "claim filed");
        Ok(ClaimOutcome::PendingVerification(workflow))
    }

    /// Resolves a verification workflow and applies the outcome.
    ///
    /// Approval attaches the verdict to the claim log, completes the task
    /// with a floating deadline, and auto-resets recurring tasks.
    /// Rejection follows the configured policy: straight back to `todo`,
    /// or escalation into a group vote among `members`.
    ///
    /// # Errors
    ///
    /// Fails on workflow guards (not found, not pending, expired,
    /// self-approval), on a wrong workflow type, or on a store error.
    pub fn resolve_verification(
        &self,
        workflow_id: &WorkflowId,
        resolver: &MemberId,
        resolver_name: &str,
        decision: Decision,
        feedback: Option<&str>,
        members: &[MemberId],
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, CoreError> {
        self.ensure_kind(workflow_id, WorkflowType::Verification)?;
        let workflow = self
            .engine
            .resolve(workflow_id, resolver, resolver_name, decision, feedback, now)?;
        let task_id = workflow.target_id.clone();

        let action = match decision {
            Decision::Approved => ActionTag::Approve,
            Decision::Rejected => ActionTag::Reject,
        };
        let mut entry = LogEntry::new(task_id.clone(), resolver.clone(), action, now);
        entry.notes = feedback.map(ToString::to_string);
        self.store.create(&entry)?;

        let outcome = match decision {
            Decision::Approved => {
                if let Some(claim_log_id) = &workflow.metadata.claim_log_id {
                    self.attach_claim_verdict(
                        &claim_log_id.to_string(),
                        Decision::Approved,
                        resolver,
                        now,
                    )?;
                }
                self.lifecycle.complete(&task_id, now)?;
                let task = self.lifecycle.reset_recurring(&task_id)?;
                send_best_effort(
                    &self.sink,
                    &workflow.requester_user_id,
                    &format!("\"{}\" was approved by {resolver_name}", workflow.target_title),
                );
                VerificationOutcome::Completed(task)
            }
            Decision::Rejected => match self.config.rejection_policy {
                RejectionPolicy::Reset => {
                    if let Some(claim_log_id) = &workflow.metadata.claim_log_id {
                        self.attach_claim_verdict(
                            &claim_log_id.to_string(),
                            Decision::Rejected,
                            resolver,
                            now,
                        )?;
                    }
                    let task = self.lifecycle.reject_to_todo(&task_id)?;
                    send_best_effort(
                        &self.sink,
                        &workflow.requester_user_id,
                        &format!("\"{}\" was rejected by {resolver_name}", workflow.target_title),
                    );
                    VerificationOutcome::ResetToTodo(task)
                }
                RejectionPolicy::Vote => {
                    self.lifecycle.escalate_conflict(&task_id)?;
                    let ballots = self.conflict.initiate(
                        &task_id,
                        &workflow.id,
                        &workflow.requester_user_id,
                        resolver,
                        members,
                        now,
                    )?;
                    for ballot in &ballots {
                        send_best_effort(
                            &self.sink,
                            &ballot.voter_id,
                            &format!("vote requested on \"{}\"", workflow.target_title),
                        );
                    }
                    VerificationOutcome::ConflictOpened(ballots)
                }
            },
        };
        Ok(outcome)
    }

    /// Asks for a task to be deleted; another member must second it.
    ///
    /// # Errors
    ///
    /// Fails when the task does not exist, a deletion request is already
    /// pending, or on a store error.
    pub fn request_deletion(
        &self,
        task_id: &TaskId,
        requester: &MemberId,
        requester_name: &str,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Workflow, CoreError> {
        let task = self.lifecycle.fetch(task_id)?;
        let workflow = self.engine.create(
            WorkflowRequest {
                kind: WorkflowType::DeletionApproval,
                requester: requester.clone(),
                requester_name: requester_name.to_string(),
                target_id: task_id.clone(),
                target_title: task.title.clone(),
                expiry_hours: Some(self.config.workflow_expiry_hours),
                metadata: WorkflowMetadata::default(),
            },
            now,
        )?;
        let mut entry = LogEntry::new(
            task_id.clone(),
            requester.clone(),
            ActionTag::DeleteRequest,
            now,
        );
        entry.notes = note.map(ToString::to_string);
        self.store.create(&entry)?;
        Ok(workflow)
    }

    /// Seconds or turns down a deletion request. Approval archives the
    /// task.
    ///
    /// # Errors
    ///
    /// Fails on workflow guards, when approving while the task is not in
    /// `todo`, or on a store error.
    pub fn resolve_deletion(
        &self,
        workflow_id: &WorkflowId,
        resolver: &MemberId,
        resolver_name: &str,
        decision: Decision,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Workflow, CoreError> {
        let pending = self.ensure_kind(workflow_id, WorkflowType::DeletionApproval)?;
        if decision == Decision::Approved {
            // Check archivability before resolving: a resolved workflow
            // cannot be reopened if the archive guard then fails.
            let task = self.lifecycle.fetch(&pending.target_id)?;
            if task.current_state != TaskState::Todo {
                return Err(CoreError::NotDeletable {
                    task: task.id,
                    state: task.current_state,
                });
            }
        }

        let workflow = self
            .engine
            .resolve(workflow_id, resolver, resolver_name, decision, reason, now)?;

        let action = match decision {
            Decision::Approved => ActionTag::DeleteApprove,
            Decision::Rejected => ActionTag::DeleteReject,
        };
        let mut entry = LogEntry::new(workflow.target_id.clone(), resolver.clone(), action, now);
        entry.notes = reason.map(ToString::to_string);
        self.store.create(&entry)?;

        if decision == Decision::Approved {
            self.lifecycle.archive(&workflow.target_id)?;
        }
        send_best_effort(
            &self.sink,
            &workflow.requester_user_id,
            &format!(
                "deletion of \"{}\" was {} by {resolver_name}",
                workflow.target_title,
                decision.as_status()
            ),
        );
        Ok(workflow)
    }

    /// Casts one member's vote on a conflicted task.
    ///
    /// # Errors
    ///
    /// See [`ConflictService::cast_vote`].
    pub fn cast_vote(
        &self,
        task_id: &TaskId,
        voter: &MemberId,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> Result<VoteRecord, CoreError> {
        Ok(self.conflict.cast_vote(task_id, voter, choice, now)?)
    }

    /// Tallies a complete conflict episode and applies the outcome.
    ///
    /// # Errors
    ///
    /// See [`ConflictService::tally`].
    pub fn tally_votes(
        &self,
        task_id: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<TallyOutcome, CoreError> {
        Ok(self.conflict.tally(task_id, now)?)
    }

    /// Current standings computed from the audit log.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, CoreError> {
        Ok(self.leaderboard.build()?)
    }

    /// Pending workflows `user` can act on.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn actionable_for(&self, user: &MemberId) -> Result<Vec<Workflow>, CoreError> {
        Ok(self.engine.list_actionable(user)?)
    }

    /// Background sweep: expires overdue pending workflows. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn expire_workflows(&self, now: DateTime<Utc>) -> Result<Vec<Workflow>, CoreError> {
        Ok(self.engine.expire_overdue(now)?)
    }

    /// Background sweep: notifies assignees of overdue tasks and returns
    /// them. Changes no state, so repeated runs are safe.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn remind_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, CoreError> {
        let overdue = self.lifecycle.list_overdue(now)?;
        for task in &overdue {
            if let Some(assignee) = &task.assigned_to {
                send_best_effort(
                    &self.sink,
                    assignee,
                    &format!("\"{}\" is overdue", task.title),
                );
            }
        }
        Ok(overdue)
    }

    fn ensure_kind(
        &self,
        workflow_id: &WorkflowId,
        expected: WorkflowType,
    ) -> Result<Workflow, CoreError> {
        let workflow = self.engine.get(workflow_id)?;
        if workflow.kind == expected {
            Ok(workflow)
        } else {
            Err(CoreError::UnexpectedKind {
                workflow: workflow_id.clone(),
                expected,
                got: workflow.kind,
            })
        }
    }

    fn attach_claim_verdict(
        &self,
        claim_log_id: &str,
        decision: Decision,
        decided_by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut claim: LogEntry = self.store.get(claim_log_id)?;
        claim.attach_decision(decision, decided_by.clone(), now);
        self.store.update(&claim)?;
        Ok(())
    }
}
