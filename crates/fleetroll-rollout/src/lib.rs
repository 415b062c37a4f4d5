//! fleetroll server-group rollout — two-phase updates across managed servers.
//!
//! Each server group of a plan is updated by a [`RolloutTask`]: every
//! server's update is prepared remotely, recorded against the group's
//! failure policy, and reported to a result handler. Prepared operations
//! are committed or rolled back once the whole plan has run.
//!
//! # Components
//!
//! - **`task`** — `RolloutTask` orchestrator and the `RolloutStrategy` seam
//! - **`strategy`** — concurrent and rolling dispatch
//! - **`policy`** — per-group failure thresholds, plan-wide cancellation
//! - **`executor`** — dispatch, prepared-operation tracking and resolution
//! - **`handler`** — per-server result observers
//! - **`context`** — execution identity scoping
//! - **`plan`** — runs all groups of a rollout plan

pub mod context;
pub mod error;
pub mod executor;
pub mod handler;
pub mod plan;
pub mod policy;
pub mod strategy;
pub mod task;

pub use context::{current_subject, with_subject};
pub use error::{RolloutError, RolloutResult};
pub use executor::{
    BoxFuture, PreparedOperation, ResolutionReport, ServerDispatcher, ServerTaskExecutor,
    TrackingExecutor, TransactionHandle,
};
pub use handler::{CollectingResultHandler, ServerUpdateResultHandler};
pub use plan::{PlanOutcome, RolloutPlan};
pub use policy::{GroupUpdatePolicy, RolloutPlanPolicy, ServerUpdatePolicy};
pub use strategy::{ConcurrentStrategy, RollingStrategy};
pub use task::{RolloutStrategy, RolloutTask};
