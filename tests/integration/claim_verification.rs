//! Integration tests for the claim → verification flow.
//!
//! Exercises `CoreService` end to end: filing a completion claim, the
//! verification workflow it opens, approval with the floating deadline
//! recompute, and both rejection policies.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use choreboard::{
    ClaimOutcome, CoreConfig, CoreError, CoreService, MemoryStore, RecordingSink, RejectionPolicy,
    Store, TaskDefinition, VerificationOutcome, WorkflowError,
};
use choreboard_model::{
    Decision, Filter, LogEntry, MemberId, Scope, TaskState, VerificationPolicy,
};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn at(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, d, h, mi, 0).single().unwrap()
}

fn make_service(config: CoreConfig) -> (Arc<MemoryStore>, CoreService<MemoryStore, RecordingSink>) {
    let store = Arc::new(MemoryStore::new());
    let service = CoreService::new(Arc::clone(&store), RecordingSink::new(), config);
    (store, service)
}

/// A shared daily chore assigned to alice, peer-verified, due 20:00.
fn daily_chore(service: &CoreService<MemoryStore, RecordingSink>) -> choreboard_model::Task {
    service
        .define_task(
            TaskDefinition {
                title: "Take out the trash".to_string(),
                description: None,
                owner_id: Some(MemberId::new("alice")),
                assigned_to: Some(MemberId::new("alice")),
                scope: Scope::Shared,
                verification: VerificationPolicy::Peer,
                schedule_text: Some("0 20 * * *".to_string()),
            },
            at(2, 9, 0),
        )
        .expect("define task")
}

// --- claim tests ---

#[test]
fn claim_opens_verification_and_snapshots_the_deadline() {
    let (store, service) = make_service(CoreConfig::default());
    let task = daily_chore(&service);

    let outcome = service
        .claim_completion(
            &task.id,
            &MemberId::new("alice"),
            "Alice",
            Some("done before dinner"),
            at(2, 18, 0),
        )
        .expect("claim");
    let ClaimOutcome::PendingVerification(workflow) = outcome else {
        panic!("expected a pending verification");
    };

    assert_eq!(workflow.target_id, task.id);
    assert_eq!(workflow.requester_user_id, MemberId::new("alice"));
    assert!(workflow.is_pending());

    let claims: Vec<LogEntry> = store
        .list(&Filter::new().eq("action", "claim"), None, None)
        .expect("list claims");
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].notes.as_deref(), Some("done before dinner"));
    assert_eq!(claims[0].deadline_at_claim, Some(at(2, 20, 0)));
    assert!(!claims[0].is_swap);
}

#[test]
fn double_claim_is_rejected_by_the_state_guard() {
    let (_, service) = make_service(CoreConfig::default());
    let task = daily_chore(&service);
    let alice = MemberId::new("alice");
    service
        .claim_completion(&task.id, &alice, "Alice", None, at(2, 18, 0))
        .expect("first claim");

    let err = service
        .claim_completion(&task.id, &alice, "Alice", None, at(2, 18, 5))
        .expect_err("second claim must fail");
    assert!(matches!(err, CoreError::Lifecycle(_)));
}

// --- approval tests ---

#[test]
fn approval_completes_resets_and_floats_the_deadline() {
    let (store, service) = make_service(CoreConfig::default());
    let task = daily_chore(&service);
    let ClaimOutcome::PendingVerification(workflow) = service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(2, 20, 30))
        .expect("claim")
    else {
        panic!("expected a pending verification");
    };

    // Approved after the 20:00 deadline: the next fire anchors to the
    // approval time, not the stale deadline.
    let outcome = service
        .resolve_verification(
            &workflow.id,
            &MemberId::new("bob"),
            "Bob",
            Decision::Approved,
            None,
            &[],
            at(2, 21, 0),
        )
        .expect("approve");
    let VerificationOutcome::Completed(task) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(task.current_state, TaskState::Todo);
    assert_eq!(task.deadline, Some(at(3, 20, 0)));

    // The verdict landed on the claim log.
    let claims: Vec<LogEntry> = store
        .list(&Filter::new().eq("action", "claim"), None, None)
        .expect("list claims");
    assert_eq!(claims[0].decision, Some(Decision::Approved));
    assert_eq!(claims[0].decided_by, Some(MemberId::new("bob")));
}

#[test]
fn claimer_cannot_verify_their_own_claim() {
    let (_, service) = make_service(CoreConfig::default());
    let task = daily_chore(&service);
    let alice = MemberId::new("alice");
    let ClaimOutcome::PendingVerification(workflow) = service
        .claim_completion(&task.id, &alice, "Alice", None, at(2, 18, 0))
        .expect("claim")
    else {
        panic!("expected a pending verification");
    };

    let err = service
        .resolve_verification(
            &workflow.id,
            &alice,
            "Alice",
            Decision::Approved,
            None,
            &[],
            at(2, 19, 0),
        )
        .expect_err("self-approval must fail");
    assert!(matches!(
        err,
        CoreError::Workflow(WorkflowError::SelfApproval)
    ));
}

#[test]
fn workflow_resolves_exactly_once() {
    let (_, service) = make_service(CoreConfig::default());
    let task = daily_chore(&service);
    let ClaimOutcome::PendingVerification(workflow) = service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(2, 18, 0))
        .expect("claim")
    else {
        panic!("expected a pending verification");
    };

    service
        .resolve_verification(
            &workflow.id,
            &MemberId::new("bob"),
            "Bob",
            Decision::Approved,
            None,
            &[],
            at(2, 19, 0),
        )
        .expect("first resolution");
    let err = service
        .resolve_verification(
            &workflow.id,
            &MemberId::new("carol"),
            "Carol",
            Decision::Rejected,
            None,
            &[],
            at(2, 19, 5),
        )
        .expect_err("second resolution must fail");
    assert!(matches!(
        err,
        CoreError::Workflow(WorkflowError::NotPending { .. })
    ));
}

// --- rejection policy tests ---

#[test]
fn rejection_under_reset_policy_skips_the_vote() {
    let (_, service) = make_service(CoreConfig {
        rejection_policy: RejectionPolicy::Reset,
        ..CoreConfig::default()
    });
    let task = daily_chore(&service);
    let ClaimOutcome::PendingVerification(workflow) = service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(2, 18, 0))
        .expect("claim")
    else {
        panic!("expected a pending verification");
    };

    let outcome = service
        .resolve_verification(
            &workflow.id,
            &MemberId::new("bob"),
            "Bob",
            Decision::Rejected,
            Some("bin is still full"),
            &[],
            at(2, 19, 0),
        )
        .expect("reject");
    let VerificationOutcome::ResetToTodo(task) = outcome else {
        panic!("expected a plain reset");
    };
    assert_eq!(task.current_state, TaskState::Todo);
}

#[test]
fn no_verification_policy_auto_completes() {
    let (_, service) = make_service(CoreConfig::default());
    let task = service
        .define_task(
            TaskDefinition {
                title: "Water the plants".to_string(),
                description: None,
                owner_id: Some(MemberId::new("alice")),
                assigned_to: Some(MemberId::new("alice")),
                scope: Scope::Personal,
                verification: VerificationPolicy::None,
                schedule_text: None,
            },
            at(2, 9, 0),
        )
        .expect("define");

    let outcome = service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(2, 10, 0))
        .expect("claim");
    let ClaimOutcome::AutoCompleted(task) = outcome else {
        panic!("expected auto-completion");
    };
    // One-off task: stays completed.
    assert_eq!(task.current_state, TaskState::Completed);
}

// --- expiry sweep tests ---

#[test]
fn stale_verification_expires_and_blocks_late_resolution() {
    let (_, service) = make_service(CoreConfig::default());
    let task = daily_chore(&service);
    let ClaimOutcome::PendingVerification(workflow) = service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(2, 18, 0))
        .expect("claim")
    else {
        panic!("expected a pending verification");
    };

    let later = at(2, 18, 0) + Duration::hours(49);
    let expired = service.expire_workflows(later).expect("sweep");
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, workflow.id);

    let err = service
        .resolve_verification(
            &workflow.id,
            &MemberId::new("bob"),
            "Bob",
            Decision::Approved,
            None,
            &[],
            later,
        )
        .expect_err("resolving an expired workflow must fail");
    assert!(matches!(
        err,
        CoreError::Workflow(WorkflowError::NotPending { .. })
    ));
}
