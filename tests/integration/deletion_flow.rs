//! Integration tests for the deletion (soft-delete) flow.
//!
//! Deleting a task takes two members: one requests, another seconds. An
//! approved request archives the task through the state machine, which
//! only permits archiving from `todo`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use choreboard::{
    CoreConfig, CoreError, CoreService, MemoryStore, RecordingSink, Store, TaskDefinition,
    WorkflowError,
};
use choreboard_model::{
    ActionTag, Decision, Filter, LogEntry, MemberId, Scope, Task, TaskState, VerificationPolicy,
    WorkflowStatus,
};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn at(h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, mi, 0).single().unwrap()
}

fn make_service() -> (Arc<MemoryStore>, CoreService<MemoryStore, RecordingSink>) {
    let store = Arc::new(MemoryStore::new());
    let service = CoreService::new(Arc::clone(&store), RecordingSink::new(), CoreConfig::default());
    (store, service)
}

fn make_task(service: &CoreService<MemoryStore, RecordingSink>) -> Task {
    service
        .define_task(
            TaskDefinition {
                title: "Mow the lawn".to_string(),
                description: None,
                owner_id: Some(MemberId::new("alice")),
                assigned_to: Some(MemberId::new("alice")),
                scope: Scope::Shared,
                verification: VerificationPolicy::Peer,
                schedule_text: Some("every_7_days".to_string()),
            },
            at(9, 0),
        )
        .expect("define task")
}

// --- happy path tests ---

#[test]
fn seconded_deletion_archives_and_logs_both_steps() {
    let (store, service) = make_service();
    let task = make_task(&service);

    let workflow = service
        .request_deletion(
            &task.id,
            &MemberId::new("alice"),
            "Alice",
            Some("we paved the garden"),
            at(10, 0),
        )
        .expect("request deletion");
    assert!(workflow.is_pending());

    let resolved = service
        .resolve_deletion(
            &workflow.id,
            &MemberId::new("bob"),
            "Bob",
            Decision::Approved,
            None,
            at(11, 0),
        )
        .expect("second the deletion");
    assert_eq!(resolved.status, WorkflowStatus::Approved);

    let current: Task = store.get(&task.id.to_string()).expect("fetch task");
    assert_eq!(current.current_state, TaskState::Archived);

    let entries: Vec<LogEntry> = store
        .list(&Filter::new().eq("task_id", task.id.to_string()), None, None)
        .expect("list log");
    let tags: Vec<ActionTag> = entries.iter().map(|e| e.action).collect();
    assert!(tags.contains(&ActionTag::DeleteRequest));
    assert!(tags.contains(&ActionTag::DeleteApprove));
}

#[test]
fn turned_down_deletion_leaves_the_task_alone() {
    let (store, service) = make_service();
    let task = make_task(&service);
    let workflow = service
        .request_deletion(&task.id, &MemberId::new("alice"), "Alice", None, at(10, 0))
        .expect("request deletion");

    let resolved = service
        .resolve_deletion(
            &workflow.id,
            &MemberId::new("bob"),
            "Bob",
            Decision::Rejected,
            Some("we still need this"),
            at(11, 0),
        )
        .expect("turn it down");
    assert_eq!(resolved.status, WorkflowStatus::Rejected);
    assert_eq!(resolved.reason.as_deref(), Some("we still need this"));

    let rejections: Vec<LogEntry> = store
        .list(&Filter::new().eq("action", "delete_reject"), None, None)
        .expect("list log");
    assert_eq!(rejections.len(), 1);
}

// --- guard tests ---

#[test]
fn requester_cannot_second_their_own_deletion() {
    let (_, service) = make_service();
    let task = make_task(&service);
    let alice = MemberId::new("alice");
    let workflow = service
        .request_deletion(&task.id, &alice, "Alice", None, at(10, 0))
        .expect("request deletion");

    let err = service
        .resolve_deletion(&workflow.id, &alice, "Alice", Decision::Approved, None, at(11, 0))
        .expect_err("self-seconding must fail");
    assert!(matches!(
        err,
        CoreError::Workflow(WorkflowError::SelfApproval)
    ));
}

#[test]
fn only_one_deletion_request_per_task() {
    let (_, service) = make_service();
    let task = make_task(&service);
    service
        .request_deletion(&task.id, &MemberId::new("alice"), "Alice", None, at(10, 0))
        .expect("first request");

    let err = service
        .request_deletion(&task.id, &MemberId::new("bob"), "Bob", None, at(10, 5))
        .expect_err("duplicate request must fail");
    assert!(matches!(
        err,
        CoreError::Workflow(WorkflowError::DuplicatePending { .. })
    ));
}

#[test]
fn mid_verification_task_cannot_be_deleted() {
    let (_, service) = make_service();
    let task = make_task(&service);
    let workflow = service
        .request_deletion(&task.id, &MemberId::new("alice"), "Alice", None, at(10, 0))
        .expect("request deletion");

    // The task is claimed while the deletion request is open.
    service
        .claim_completion(&task.id, &MemberId::new("alice"), "Alice", None, at(10, 30))
        .expect("claim");

    let err = service
        .resolve_deletion(
            &workflow.id,
            &MemberId::new("bob"),
            "Bob",
            Decision::Approved,
            None,
            at(11, 0),
        )
        .expect_err("approving while pending_verification must fail");
    assert!(matches!(
        err,
        CoreError::NotDeletable {
            state: TaskState::PendingVerification,
            ..
        }
    ));
}

#[test]
fn deleting_an_unknown_task_fails_up_front() {
    let (_, service) = make_service();
    let err = service
        .request_deletion(
            &choreboard_model::TaskId::new(),
            &MemberId::new("alice"),
            "Alice",
            None,
            at(10, 0),
        )
        .expect_err("unknown task must fail");
    assert!(matches!(err, CoreError::Lifecycle(_)));
}
