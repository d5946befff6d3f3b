//! Integration tests for the takeover quota and point attribution.
//!
//! A takeover is claiming a task assigned to someone else: it consumes
//! the helper's weekly quota, and credit for the completion depends on
//! whether approval landed before or after the deadline the task had at
//! claim time.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use choreboard::{
    ClaimOutcome, CoreConfig, CoreError, CoreService, MemoryStore, RecordingSink, TakeoverError,
    TaskDefinition, week_start,
};
use choreboard_model::{Decision, MemberId, Scope, Task, VerificationPolicy};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn at(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, d, h, mi, 0).single().unwrap()
}

fn make_service(limit: u32) -> CoreService<MemoryStore, RecordingSink> {
    let store = Arc::new(MemoryStore::new());
    CoreService::new(
        store,
        RecordingSink::new(),
        CoreConfig {
            takeover_weekly_limit: limit,
            ..CoreConfig::default()
        },
    )
}

/// A daily 20:00 chore assigned to alice.
fn alices_chore(service: &CoreService<MemoryStore, RecordingSink>, title: &str) -> Task {
    service
        .define_task(
            TaskDefinition {
                title: title.to_string(),
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

/// Bob claims the task and carol approves it at `approved_at`.
fn take_over_and_approve(
    service: &CoreService<MemoryStore, RecordingSink>,
    task: &Task,
    claimed_at: DateTime<Utc>,
    approved_at: DateTime<Utc>,
) {
    let ClaimOutcome::PendingVerification(workflow) = service
        .claim_completion(&task.id, &MemberId::new("bob"), "Bob", None, claimed_at)
        .expect("takeover claim")
    else {
        panic!("expected a pending verification");
    };
    service
        .resolve_verification(
            &workflow.id,
            &MemberId::new("carol"),
            "Carol",
            Decision::Approved,
            None,
            &[],
            approved_at,
        )
        .expect("approve");
}

// --- attribution tests ---

#[test]
fn early_takeover_credits_the_original_assignee() {
    let service = make_service(3);
    let task = alices_chore(&service, "Dishes");
    // Deadline is 20:00; approval lands at 15:00, so alice is presumed to
    // have been about to do it and keeps the point.
    take_over_and_approve(&service, &task, at(2, 14, 0), at(2, 15, 0));

    let standings = service.leaderboard().expect("standings");
    assert_eq!(standings.len(), 1);
    assert_eq!(standings[0].member_id, MemberId::new("alice"));
    assert_eq!(standings[0].points, 1);
}

#[test]
fn late_takeover_credits_the_helper() {
    let service = make_service(3);
    let task = alices_chore(&service, "Dishes");
    // Claimed at 20:30 with the deadline already past; approval at 21:00
    // is after the snapshot, so bob earns the point.
    take_over_and_approve(&service, &task, at(2, 20, 30), at(2, 21, 0));

    let standings = service.leaderboard().expect("standings");
    assert_eq!(standings.len(), 1);
    assert_eq!(standings[0].member_id, MemberId::new("bob"));
    assert_eq!(standings[0].points, 1);
}

#[test]
fn attribution_uses_the_deadline_at_claim_not_the_floated_one() {
    let service = make_service(3);
    let task = alices_chore(&service, "Dishes");
    // Claimed before the 20:00 deadline but approved after it. The
    // snapshot taken at claim time (20:00) is what counts, and the
    // approval at 20:30 is past it: the helper gets the point even though
    // completion floated the task's own deadline to the next day.
    take_over_and_approve(&service, &task, at(2, 19, 0), at(2, 20, 30));

    let standings = service.leaderboard().expect("standings");
    assert_eq!(standings[0].member_id, MemberId::new("bob"));
}

// --- quota tests ---

#[test]
fn weekly_quota_is_enforced_per_member() {
    let service = make_service(2);
    let bob = MemberId::new("bob");
    for n in 0..2 {
        let task = alices_chore(&service, &format!("Chore {n}"));
        service
            .claim_completion(&task.id, &bob, "Bob", None, at(2, 10, 0))
            .expect("takeover within quota");
    }

    let third = alices_chore(&service, "Chore 2");
    let err = service
        .claim_completion(&third.id, &bob, "Bob", None, at(2, 11, 0))
        .expect_err("third takeover must fail");
    assert!(matches!(
        err,
        CoreError::Takeover(TakeoverError::LimitExceeded { limit: 2, .. })
    ));

    // Carol's quota is untouched.
    service
        .claim_completion(&third.id, &MemberId::new("carol"), "Carol", None, at(2, 11, 5))
        .expect("carol may still take over");
}

#[test]
fn quota_resets_on_monday() {
    let service = make_service(1);
    let bob = MemberId::new("bob");
    let first = alices_chore(&service, "Chore A");
    // Sunday 2026-03-08 23:00 consumes the week's single takeover.
    service
        .claim_completion(&first.id, &bob, "Bob", None, at(8, 23, 0))
        .expect("first takeover");

    let blocked = alices_chore(&service, "Chore B");
    assert!(service
        .claim_completion(&blocked.id, &bob, "Bob", None, at(8, 23, 30))
        .is_err());

    // Monday 00:30 is a fresh week.
    service
        .claim_completion(&blocked.id, &bob, "Bob", None, at(9, 0, 30))
        .expect("new week, new quota");
    assert_eq!(week_start(at(9, 0, 30)), at(9, 0, 0));
}

#[test]
fn refused_claim_on_a_pending_task_preserves_the_quota() {
    let service = make_service(1);
    let task = alices_chore(&service, "Dishes");
    // Alice's own claim puts the task in pending_verification.
    service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(2, 10, 0))
        .expect("own claim");

    // Bob's takeover attempt bounces off the state guard...
    let bob = MemberId::new("bob");
    service
        .claim_completion(&task.id, &bob, "Bob", None, at(2, 10, 30))
        .expect_err("claiming a pending task must fail");

    // ...without consuming his single weekly takeover.
    let other = alices_chore(&service, "Laundry");
    service
        .claim_completion(&other.id, &bob, "Bob", None, at(2, 11, 0))
        .expect("quota still available");
}

#[test]
fn claiming_your_own_task_never_touches_the_quota() {
    let service = make_service(0);
    let task = alices_chore(&service, "Dishes");
    // Zero quota, but alice claiming her own task is not a takeover.
    service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(2, 10, 0))
        .expect("own claim");
}
