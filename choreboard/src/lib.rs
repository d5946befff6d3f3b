//! Choreboard: shared-obligation tracking for small groups.
//!
//! The core combines five subsystems over a pluggable record store:
//!
//! - [`lifecycle`] — the task state machine (`todo` →
//!   `pending_verification` → `completed`/`conflict`/..., archive,
//!   recurring auto-reset with floating deadlines)
//! - [`workflow`] — a generic multi-step approval engine used for both
//!   completion verification and deletion seconding
//! - [`conflict`] — escalation of rejected verifications into a majority
//!   vote with deadlock detection
//! - [`takeover`] and [`leaderboard`] — the weekly takeover quota and lazy
//!   point attribution
//! - [`store`] — the adapter trait plus an in-memory implementation
//!
//! [`service::CoreService`] wires these together behind one explicitly
//! constructed object; embedders build it once at process start.

pub mod config;
pub mod conflict;
pub mod leaderboard;
pub mod lifecycle;
pub mod notify;
pub mod service;
pub mod store;
pub mod takeover;
pub mod workflow;

pub use config::{ConfigError, CoreConfig, RejectionPolicy};
pub use conflict::{ConflictError, ConflictService, SYSTEM_AUTHOR, TallyOutcome};
pub use leaderboard::{LeaderboardEntry, LeaderboardService, credit_for};
pub use lifecycle::{LifecycleError, TaskDefinition, TaskLifecycle};
pub use notify::{NotificationSink, NullSink, RecordingSink, send_best_effort};
pub use service::{ClaimOutcome, CoreError, CoreService, VerificationOutcome};
pub use store::{MemoryStore, Page, Record, Sort, Store, StoreError};
pub use takeover::{TakeoverCheck, TakeoverError, TakeoverService, week_start};
pub use workflow::{WorkflowEngine, WorkflowError, WorkflowRequest, ensure_not_self};
