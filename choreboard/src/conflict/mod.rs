//! Conflict resolution by group vote.
//!
//! When a completion claim is rejected under the voting policy, the task
//! enters `conflict` and every household member except the claimer and the
//! rejecter receives a pending ballot. The tally runs only once every
//! ballot is cast: majority yes completes the task, majority no returns it
//! to `todo`, and a tie (including the zero-voter case) deadlocks it.
//!
//! Ballots are keyed to a conflict episode, the rejected verification
//! workflow, so a task that re-enters conflict later starts from a clean
//! slate without deleting old ballots. The current episode is looked up
//! from the workflow record itself, which keeps a zero-voter episode
//! (two-member household) tallyable even though it issued no ballots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use choreboard_model::{
    ActionTag, BallotId, Decision, Filter, LogEntry, MemberId, TaskId, TaskState, VoteChoice,
    VoteRecord, Workflow, WorkflowId, WorkflowStatus, WorkflowType,
};

use crate::lifecycle::{LifecycleError, TaskLifecycle};
use crate::store::{Sort, Store, StoreError};

/// Author recorded on system-generated log entries.
pub const SYSTEM_AUTHOR: &str = "system";

/// Errors from the voting subsystem.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The task is not currently in `conflict`.
    #[error("task {task} is {state}, not in conflict")]
    NotInConflict {
        /// Task involved.
        task: TaskId,
        /// State observed.
        state: TaskState,
    },
    /// The task has no conflict episode (no rejected verification on
    /// record).
    #[error("task {0} has no conflict episode")]
    NoEpisode(TaskId),
    /// The voter holds no ballot for the current episode.
    #[error("{voter} holds no ballot for task {task}")]
    NoBallot {
        /// Task involved.
        task: TaskId,
        /// Member who tried to vote.
        voter: MemberId,
    },
    /// The voter's ballot was already cast; votes are final.
    #[error("{0} has already voted")]
    AlreadyCast(MemberId),
    /// `pending` is the issued state, not a castable choice.
    #[error("a vote must be yes or no")]
    AbstainNotAllowed,
    /// The tally cannot run while ballots are outstanding.
    #[error("{0} ballot(s) still pending")]
    VotesOutstanding(usize),
    /// Lifecycle transition failure.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Store adapter failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a completed tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyOutcome {
    /// Majority yes: the claim stands, task completed.
    Approved {
        /// Yes votes counted.
        yes: usize,
        /// No votes counted.
        no: usize,
    },
    /// Majority no: the claim is rejected, task returns to `todo`.
    Rejected {
        /// Yes votes counted.
        yes: usize,
        /// No votes counted.
        no: usize,
    },
    /// Tied (including zero voters): the task deadlocks.
    Deadlock {
        /// Yes votes counted.
        yes: usize,
        /// No votes counted.
        no: usize,
    },
}

/// Ballot issue, vote casting, and the tally.
pub struct ConflictService<S> {
    store: Arc<S>,
    lifecycle: TaskLifecycle<S>,
}

impl<S: Store> ConflictService<S> {
    /// Creates the service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        let lifecycle = TaskLifecycle::new(Arc::clone(&store));
        Self { store, lifecycle }
    }

    /// Opens a conflict episode: issues one pending ballot per eligible
    /// voter (every member except the claimer and the rejecter).
    ///
    /// Zero eligible voters is valid; the eventual tally is then a 0-0 tie
    /// and the task deadlocks.
    ///
    /// # Errors
    ///
    /// Fails unless the task is in `conflict`, or on a store error.
    pub fn initiate(
        &self,
        task_id: &TaskId,
        episode_id: &WorkflowId,
        claimer: &MemberId,
        rejecter: &MemberId,
        members: &[MemberId],
        now: DateTime<Utc>,
    ) -> Result<Vec<VoteRecord>, ConflictError> {
        self.ensure_in_conflict(task_id)?;

        let mut ballots = Vec::new();
        for member in members {
            if member == claimer || member == rejecter {
                continue;
            }
            let ballot = VoteRecord {
                id: BallotId::new(),
                task_id: task_id.clone(),
                episode_id: episode_id.clone(),
                voter_id: member.clone(),
                choice: VoteChoice::Pending,
                timestamp: now,
            };
            self.store.create(&ballot)?;
            ballots.push(ballot);
        }
        tracing::debug!(
            task = %task_id,
            episode = %episode_id,
            voters = ballots.len(),
            "conflict episode opened"
        );
        Ok(ballots)
    }

    /// Ballots of the task's current conflict episode. Empty when the
    /// episode has no eligible voters.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::NoEpisode`] when the task has no rejected
    /// verification on record.
    pub fn current_ballots(&self, task_id: &TaskId) -> Result<Vec<VoteRecord>, ConflictError> {
        let episode = self.current_episode(task_id)?;
        self.ballots_for(task_id, &episode)
    }

    /// The task's current episode: its most recently created rejected
    /// verification workflow. Keyed off the workflow record rather than
    /// the ballots, since an episode may legitimately have none.
    fn current_episode(&self, task_id: &TaskId) -> Result<WorkflowId, ConflictError> {
        let filter = Filter::new()
            .eq("type", WorkflowType::Verification.to_string())
            .eq("target_id", task_id.to_string())
            .eq("status", WorkflowStatus::Rejected.to_string());
        let newest: Vec<Workflow> =
            self.store
                .list(&filter, Some(&Sort::desc("created_at")), None)?;
        newest
            .into_iter()
            .next()
            .map(|workflow| workflow.id)
            .ok_or_else(|| ConflictError::NoEpisode(task_id.clone()))
    }

    fn ballots_for(
        &self,
        task_id: &TaskId,
        episode: &WorkflowId,
    ) -> Result<Vec<VoteRecord>, ConflictError> {
        Ok(self.store.list(
            &Filter::new()
                .eq("task_id", task_id.to_string())
                .eq("episode_id", episode.to_string()),
            None,
            None,
        )?)
    }

    /// Casts one member's vote. A ballot can be cast exactly once and only
    /// to a definitive choice.
    ///
    /// # Errors
    ///
    /// Fails when the task is not in conflict, the voter holds no ballot,
    /// the ballot was already cast, or `choice` is `Pending`.
    pub fn cast_vote(
        &self,
        task_id: &TaskId,
        voter: &MemberId,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> Result<VoteRecord, ConflictError> {
        if choice == VoteChoice::Pending {
            return Err(ConflictError::AbstainNotAllowed);
        }
        self.ensure_in_conflict(task_id)?;

        let ballots = self.current_ballots(task_id)?;
        let Some(mut ballot) = ballots.into_iter().find(|b| &b.voter_id == voter) else {
            return Err(ConflictError::NoBallot {
                task: task_id.clone(),
                voter: voter.clone(),
            });
        };
        if ballot.choice != VoteChoice::Pending {
            return Err(ConflictError::AlreadyCast(voter.clone()));
        }

        ballot.choice = choice;
        ballot.timestamp = now;
        self.store.update(&ballot)?;

        let mut entry = LogEntry::new(task_id.clone(), voter.clone(), ActionTag::Vote, now);
        entry.notes = Some(choice.to_string());
        self.store.create(&entry)?;
        tracing::debug!(task = %task_id, voter = %voter, %choice, "vote cast");
        Ok(ballot)
    }

    /// Runs the tally once every ballot of the current episode is cast,
    /// applies the outcome to the task, and appends a system-authored
    /// summary log entry.
    ///
    /// On approval the verdict is attached to the originating claim log
    /// entry, which is what point attribution later reads.
    ///
    /// # Errors
    ///
    /// Fails while any ballot is still pending, when the task is not in
    /// conflict, or on a store/lifecycle error.
    pub fn tally(&self, task_id: &TaskId, now: DateTime<Utc>) -> Result<TallyOutcome, ConflictError> {
        self.ensure_in_conflict(task_id)?;
        let episode_id = self.current_episode(task_id)?;
        let ballots = self.ballots_for(task_id, &episode_id)?;

        let pending = ballots
            .iter()
            .filter(|b| b.choice == VoteChoice::Pending)
            .count();
        if pending > 0 {
            return Err(ConflictError::VotesOutstanding(pending));
        }

        // No ballots means no eligible voters: a 0-0 tie that deadlocks.
        let yes = ballots.iter().filter(|b| b.choice == VoteChoice::Yes).count();
        let no = ballots.iter().filter(|b| b.choice == VoteChoice::No).count();

        let system = MemberId::new(SYSTEM_AUTHOR);
        let outcome = if yes > no {
            self.attach_verdict(&episode_id, Decision::Approved, &system, now)?;
            self.lifecycle.conflict_approve(task_id, now)?;
            self.lifecycle.reset_recurring(task_id)?;
            TallyOutcome::Approved { yes, no }
        } else if no > yes {
            self.attach_verdict(&episode_id, Decision::Rejected, &system, now)?;
            self.lifecycle.conflict_reject(task_id)?;
            TallyOutcome::Rejected { yes, no }
        } else {
            self.lifecycle.conflict_deadlock(task_id)?;
            TallyOutcome::Deadlock { yes, no }
        };

        let mut summary = LogEntry::new(task_id.clone(), system, ActionTag::Tally, now);
        summary.notes = Some(format!("yes: {yes}, no: {no}"));
        self.store.create(&summary)?;
        tracing::debug!(task = %task_id, yes, no, ?outcome, "conflict tallied");
        Ok(outcome)
    }

    fn ensure_in_conflict(&self, task_id: &TaskId) -> Result<(), ConflictError> {
        let task = self.lifecycle.fetch(task_id)?;
        if task.current_state == TaskState::Conflict {
            Ok(())
        } else {
            Err(ConflictError::NotInConflict {
                task: task_id.clone(),
                state: task.current_state,
            })
        }
    }

    /// Attaches the tally's verdict to the claim log entry the episode
    /// workflow points at. A missing pointer is tolerated; attribution
    /// then treats the completion as unclaimed.
    fn attach_verdict(
        &self,
        episode_id: &WorkflowId,
        decision: Decision,
        decided_by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<(), ConflictError> {
        let workflow: Workflow = self.store.get(&episode_id.to_string())?;
        let Some(claim_log_id) = workflow.metadata.claim_log_id else {
            return Ok(());
        };
        let mut claim: LogEntry = self.store.get(&claim_log_id.to_string())?;
        claim.attach_decision(decision, decided_by.clone(), now);
        self.store.update(&claim)?;
        Ok(())
    }
}
