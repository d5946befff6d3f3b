//! The task lifecycle state machine.
//!
//! Validates and applies transitions on a single task. Every transition is
//! a fresh read-modify-write against the store: the machine never holds a
//! task in memory across an approval round-trip, so concurrent attempts
//! each observe the latest committed state. Conflict outcomes are applied
//! only through the dedicated `conflict_*` methods, which the voting
//! subsystem drives.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use choreboard_model::{
    MemberId, ScheduleError, Scope, Task, TaskId, TaskState, VerificationPolicy, next_deadline,
    resolve_definition,
};

use crate::store::{Store, StoreError};

/// Errors from lifecycle transitions.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A transition guard failed; retrying without a state change will
    /// fail identically.
    #[error("invalid transition for task {task}: {from} cannot move to {to}")]
    InvalidTransition {
        /// Task involved.
        task: TaskId,
        /// State observed at the guard.
        from: TaskState,
        /// State the caller asked for.
        to: TaskState,
    },
    /// Store adapter failure (including task-not-found).
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Schedule text could not be resolved or evaluated.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Everything needed to define a new task.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    /// Short human-readable title.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Member defining the task.
    pub owner_id: Option<MemberId>,
    /// Member responsible for it, if any.
    pub assigned_to: Option<MemberId>,
    /// Shared or personal.
    pub scope: Scope,
    /// How completions are verified.
    pub verification: VerificationPolicy,
    /// Schedule text (canonical descriptor or shortcut); `None` for an
    /// undated one-off task.
    pub schedule_text: Option<String>,
}

/// The task lifecycle state machine over a store adapter.
pub struct TaskLifecycle<S> {
    store: Arc<S>,
}

impl<S: Store> TaskLifecycle<S> {
    /// Creates the state machine over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Defines a new task in `todo`, resolving any schedule text into the
    /// canonical descriptor and the initial deadline.
    ///
    /// # Errors
    ///
    /// Returns a schedule error for unrecognized schedule text, or a store
    /// error.
    pub fn define(&self, def: TaskDefinition, now: DateTime<Utc>) -> Result<Task, LifecycleError> {
        let (schedule, deadline) = match def.schedule_text.as_deref() {
            Some(text) => {
                let resolved = resolve_definition(text, now)?;
                (resolved.schedule, resolved.deadline)
            }
            None => (None, None),
        };

        let task = Task {
            id: TaskId::new(),
            title: def.title,
            description: def.description,
            owner_id: def.owner_id,
            assigned_to: def.assigned_to,
            scope: def.scope,
            verification: def.verification,
            current_state: TaskState::Todo,
            schedule,
            deadline,
        };
        self.store.create(&task)?;
        tracing::debug!(task = %task.id, title = %task.title, "task defined");
        Ok(task)
    }

    /// Re-reads the current state of a task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the task does not exist.
    pub fn fetch(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        Ok(self.store.get(&id.to_string())?)
    }

    /// `todo` → `pending_verification`, on a completion claim.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is `todo`.
    pub fn begin_verification(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        self.transition(id, TaskState::Todo, TaskState::PendingVerification, None)
    }

    /// `pending_verification` → `completed`, on an approved claim.
    ///
    /// For recurring tasks the next deadline is recomputed anchored to
    /// `approved_at` (the floating schedule): a task completed late must
    /// not inherit a deadline already in the past.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is
    /// `pending_verification`.
    pub fn complete(
        &self,
        id: &TaskId,
        approved_at: DateTime<Utc>,
    ) -> Result<Task, LifecycleError> {
        self.transition(
            id,
            TaskState::PendingVerification,
            TaskState::Completed,
            Some(approved_at),
        )
    }

    /// `completed` → `todo`, the automatic reset for recurring tasks.
    ///
    /// One-off tasks (no schedule descriptor) are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is `completed`.
    pub fn reset_recurring(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        let mut task = self.fetch(id)?;
        self.ensure(&task, TaskState::Completed, TaskState::Todo)?;
        if !task.is_recurring() {
            return Ok(task);
        }
        task.current_state = TaskState::Todo;
        self.store.update(&task)?;
        tracing::debug!(task = %task.id, deadline = ?task.deadline, "recurring task reset");
        Ok(task)
    }

    /// `pending_verification` → `todo`, on rejection under the simple
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is
    /// `pending_verification`.
    pub fn reject_to_todo(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        self.transition(id, TaskState::PendingVerification, TaskState::Todo, None)
    }

    /// `pending_verification` → `conflict`, on rejection under the voting
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is
    /// `pending_verification`.
    pub fn escalate_conflict(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        self.transition(id, TaskState::PendingVerification, TaskState::Conflict, None)
    }

    /// `conflict` → `completed`, driven by a winning vote.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is `conflict`.
    pub fn conflict_approve(
        &self,
        id: &TaskId,
        approved_at: DateTime<Utc>,
    ) -> Result<Task, LifecycleError> {
        self.transition(
            id,
            TaskState::Conflict,
            TaskState::Completed,
            Some(approved_at),
        )
    }

    /// `conflict` → `todo`, driven by a losing vote.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is `conflict`.
    pub fn conflict_reject(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        self.transition(id, TaskState::Conflict, TaskState::Todo, None)
    }

    /// `conflict` → `deadlock`, on a tied vote. Terminal until manual
    /// administrative intervention.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is `conflict`.
    pub fn conflict_deadlock(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        self.transition(id, TaskState::Conflict, TaskState::Deadlock, None)
    }

    /// `todo` → `archived`: the soft delete. A task mid-verification must
    /// first return to `todo`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the task is `todo`.
    pub fn archive(&self, id: &TaskId) -> Result<Task, LifecycleError> {
        self.transition(id, TaskState::Todo, TaskState::Archived, None)
    }

    /// Tasks in `todo` whose deadline has passed, oldest deadline first.
    ///
    /// # Errors
    ///
    /// Returns a store error on adapter failure.
    pub fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, LifecycleError> {
        let filter = choreboard_model::Filter::new().eq("current_state", "todo");
        let mut tasks: Vec<Task> = self.store.list(&filter, None, None)?;
        tasks.retain(|task| task.deadline.is_some_and(|deadline| deadline < now));
        tasks.sort_by_key(|task| task.deadline);
        Ok(tasks)
    }

    /// Single read-modify-write transition with a state guard. When
    /// `recompute_anchor` is set and the task recurs, the deadline is
    /// recomputed from that anchor.
    fn transition(
        &self,
        id: &TaskId,
        from: TaskState,
        to: TaskState,
        recompute_anchor: Option<DateTime<Utc>>,
    ) -> Result<Task, LifecycleError> {
        let mut task = self.fetch(id)?;
        self.ensure(&task, from, to)?;
        task.current_state = to;
        if let (Some(anchor), Some(schedule)) = (recompute_anchor, task.schedule.clone()) {
            task.deadline = Some(next_deadline(&schedule, anchor)?);
        }
        self.store.update(&task)?;
        tracing::debug!(task = %task.id, %from, %to, "task transition");
        Ok(task)
    }

    #[allow(clippy::unused_self)]
    fn ensure(&self, task: &Task, expected: TaskState, to: TaskState) -> Result<(), LifecycleError> {
        if task.current_state == expected {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                task: task.id.clone(),
                from: task.current_state,
                to,
            })
        }
    }
}
