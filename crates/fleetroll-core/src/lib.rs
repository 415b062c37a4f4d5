//! fleetroll-core — value types shared by the rollout crates.
//!
//! - **`identity`** — `ServerIdentity`, the map key for every per-server record
//! - **`operation`** — `UpdateOperation` and `ServerUpdateTask`
//! - **`outcome`** — `OutcomePayload` and the reserved `cancelled` outcome
//! - **`subject`** — the execution identity bundle propagated through a rollout
//! - **`config`** — `rollout.toml` plan configuration

pub mod config;
pub mod error;
pub mod identity;
pub mod operation;
pub mod outcome;
pub mod subject;

pub use config::{RolloutPlanConfig, ServerGroupConfig};
pub use error::{CoreError, CoreResult};
pub use identity::ServerIdentity;
pub use operation::{ServerUpdateTask, UpdateOperation};
pub use outcome::{Outcome, OutcomePayload};
pub use subject::Subject;
