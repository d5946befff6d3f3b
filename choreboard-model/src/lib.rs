//! Data model for Choreboard: shared-obligation tracking in small groups.
//!
//! This crate defines the persisted record shapes (tasks, workflows, log
//! entries, ballots, takeover counters), the schedule descriptor grammar,
//! the pure recurrence calculator, and the store filter expression builder.
//! All service logic lives in the `choreboard` crate.

pub mod filter;
pub mod ids;
pub mod log;
pub mod recurrence;
pub mod schedule;
pub mod task;
pub mod vote;
pub mod workflow;

pub use filter::{Filter, FilterValue, escape};
pub use ids::{BallotId, CounterId, LogId, MemberId, TaskId, WorkflowId};
pub use log::{ActionTag, LogEntry};
pub use recurrence::{CronExpr, next_deadline};
pub use schedule::{ResolvedSchedule, Schedule, ScheduleError, resolve_definition};
pub use task::{Scope, Task, TaskState, VerificationPolicy};
pub use vote::{TakeoverCounter, VoteChoice, VoteRecord};
pub use workflow::{Decision, Workflow, WorkflowMetadata, WorkflowStatus, WorkflowType};
