//! Rollout error types.

use thiserror::Error;

use fleetroll_core::{CoreError, ServerIdentity};

/// Result type alias for rollout operations.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Errors raised while dispatching or recording server updates.
///
/// None of these escape [`crate::RolloutTask::run`]; they surface to
/// strategies and to callers of the recording primitives.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("dispatch to {server} failed: {reason}")]
    Dispatch {
        server: ServerIdentity,
        reason: String,
    },

    #[error("server {0} is not part of this rollout")]
    UnknownServer(ServerIdentity),

    #[error("result already recorded for server {0}")]
    DuplicateResult(ServerIdentity),

    #[error("prepared operation already tracked for server {0}")]
    DuplicatePreparedOperation(ServerIdentity),

    #[error("result handler failed for {server}: {reason}")]
    ResultHandler {
        server: ServerIdentity,
        reason: String,
    },

    #[error("failed to resolve prepared operation on {server}: {reason}")]
    Resolution {
        server: ServerIdentity,
        reason: String,
    },

    #[error("server {0} has more than one update task")]
    DuplicateTask(ServerIdentity),

    #[error("no server group {0} in rollout plan")]
    UnknownGroup(String),

    #[error("config error: {0}")]
    Config(#[from] CoreError),
}
