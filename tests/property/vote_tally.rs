//! Property-based tests for the conflict tally.
//!
//! Uses proptest to verify:
//! 1. The tally outcome depends only on the yes/no counts, never on the
//!    order in which ballots were cast.
//! 2. The task always lands in the state the outcome dictates.
//! 3. The tally never runs while any ballot is still pending.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use choreboard::{
    ConflictError, ConflictService, MemoryStore, Store, TallyOutcome, TaskDefinition,
    TaskLifecycle,
};
use choreboard_model::{
    MemberId, Scope, TaskId, TaskState, VerificationPolicy, VoteChoice, Workflow,
    WorkflowId, WorkflowMetadata, WorkflowStatus, WorkflowType,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).single().unwrap()
}

struct Fixture {
    lifecycle: TaskLifecycle<MemoryStore>,
    service: ConflictService<MemoryStore>,
    task_id: TaskId,
}

/// A conflicted task with one pending ballot per voter in `voters`.
fn conflicted_task(voters: &[MemberId]) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = TaskLifecycle::new(Arc::clone(&store));
    let task = lifecycle
        .define(
            TaskDefinition {
                title: "Vacuum".to_string(),
                description: None,
                owner_id: Some(MemberId::new("claimer")),
                assigned_to: Some(MemberId::new("claimer")),
                scope: Scope::Shared,
                verification: VerificationPolicy::Peer,
                schedule_text: None,
            },
            base_time(),
        )
        .expect("define");
    lifecycle.begin_verification(&task.id).expect("claim");
    lifecycle.escalate_conflict(&task.id).expect("escalate");

    // The rejected verification workflow that keys the episode.
    let episode = WorkflowId::new();
    store
        .create(&Workflow {
            id: episode.clone(),
            kind: WorkflowType::Verification,
            status: WorkflowStatus::Rejected,
            requester_user_id: MemberId::new("claimer"),
            requester_name: "Claimer".to_string(),
            target_id: task.id.clone(),
            target_title: task.title.clone(),
            created_at: base_time(),
            expires_at: base_time() + Duration::hours(48),
            resolver_user_id: Some(MemberId::new("rejecter")),
            resolver_name: Some("Rejecter".to_string()),
            resolved_at: Some(base_time()),
            reason: None,
            metadata: WorkflowMetadata::default(),
        })
        .expect("store episode workflow");

    let service = ConflictService::new(Arc::clone(&store));
    let mut household = vec![MemberId::new("claimer"), MemberId::new("rejecter")];
    household.extend_from_slice(voters);
    service
        .initiate(
            &task.id,
            &episode,
            &MemberId::new("claimer"),
            &MemberId::new("rejecter"),
            &household,
            base_time(),
        )
        .expect("initiate");

    Fixture {
        lifecycle,
        service,
        task_id: task.id,
    }
}

/// Indexed yes/no choices in a random casting order.
fn arb_cast_order() -> impl Strategy<Value = Vec<(usize, bool)>> {
    prop::collection::vec(any::<bool>(), 0..7)
        .prop_map(|choices| choices.into_iter().enumerate().collect::<Vec<_>>())
        .prop_shuffle()
}

fn expected_outcome(yes: usize, no: usize) -> TallyOutcome {
    match yes.cmp(&no) {
        std::cmp::Ordering::Greater => TallyOutcome::Approved { yes, no },
        std::cmp::Ordering::Less => TallyOutcome::Rejected { yes, no },
        std::cmp::Ordering::Equal => TallyOutcome::Deadlock { yes, no },
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// The outcome is a pure function of the counts, whatever the order.
    #[test]
    fn tally_is_order_independent(cast_order in arb_cast_order()) {
        let voters: Vec<MemberId> = (0..cast_order.len())
            .map(|i| MemberId::new(format!("voter-{i}")))
            .collect();
        let fixture = conflicted_task(&voters);

        for (offset, (index, approve)) in cast_order.iter().enumerate() {
            let choice = if *approve { VoteChoice::Yes } else { VoteChoice::No };
            let when = base_time() + Duration::minutes(i64::try_from(offset).expect("small offset"));
            fixture
                .service
                .cast_vote(&fixture.task_id, &voters[*index], choice, when)
                .expect("cast vote");
        }

        let yes = cast_order.iter().filter(|(_, approve)| *approve).count();
        let no = cast_order.len() - yes;
        let outcome = fixture
            .service
            .tally(&fixture.task_id, base_time() + Duration::hours(1))
            .expect("tally");
        prop_assert_eq!(outcome, expected_outcome(yes, no));

        let task = fixture.lifecycle.fetch(&fixture.task_id).expect("fetch");
        let expected_state = match outcome {
            TallyOutcome::Approved { .. } => TaskState::Completed,
            TallyOutcome::Rejected { .. } => TaskState::Todo,
            TallyOutcome::Deadlock { .. } => TaskState::Deadlock,
        };
        prop_assert_eq!(task.current_state, expected_state);
    }

    /// With at least one ballot uncast the tally always refuses.
    #[test]
    fn tally_refuses_incomplete_episodes(
        choices in prop::collection::vec(any::<bool>(), 1..7),
        holdout in 0usize..7,
    ) {
        let holdout = holdout % choices.len();
        let voters: Vec<MemberId> = (0..choices.len())
            .map(|i| MemberId::new(format!("voter-{i}")))
            .collect();
        let fixture = conflicted_task(&voters);

        for (index, approve) in choices.iter().enumerate() {
            if index == holdout {
                continue;
            }
            let choice = if *approve { VoteChoice::Yes } else { VoteChoice::No };
            fixture
                .service
                .cast_vote(&fixture.task_id, &voters[index], choice, base_time())
                .expect("cast vote");
        }

        let err = fixture
            .service
            .tally(&fixture.task_id, base_time() + Duration::hours(1))
            .expect_err("tally must refuse");
        prop_assert!(matches!(err, ConflictError::VotesOutstanding(1)));

        // The task is untouched by the refused tally.
        let task = fixture.lifecycle.fetch(&fixture.task_id).expect("fetch");
        prop_assert_eq!(task.current_state, TaskState::Conflict);
    }
}
