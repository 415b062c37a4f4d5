//! Server task execution — dispatch to remote servers and two-phase tracking.
//!
//! Dispatching a [`ServerUpdateTask`] yields a [`PreparedOperation`]: the
//! remote server has applied the update tentatively and waits for a commit
//! or rollback. The rollout only *records* prepared operations; the
//! [`TrackingExecutor`] resolves every one of them exactly once when the
//! plan completes.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use fleetroll_core::{OutcomePayload, ServerIdentity, ServerUpdateTask, UpdateOperation};

use crate::context::current_subject;
use crate::error::{RolloutError, RolloutResult};

/// Boxed future alias for object-safe async collaborator methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Second phase of a prepared update on one remote server.
///
/// Both methods consume the handle, so an operation resolves at most once.
pub trait TransactionHandle: Send {
    fn commit(self: Box<Self>) -> RolloutResult<()>;
    fn rollback(self: Box<Self>) -> RolloutResult<()>;
}

/// An update a remote server acknowledged tentatively.
pub struct PreparedOperation {
    identity: ServerIdentity,
    operation: UpdateOperation,
    prepared_result: OutcomePayload,
    handle: Box<dyn TransactionHandle>,
}

impl PreparedOperation {
    pub fn new(
        identity: ServerIdentity,
        operation: UpdateOperation,
        prepared_result: OutcomePayload,
        handle: Box<dyn TransactionHandle>,
    ) -> Self {
        Self {
            identity,
            operation,
            prepared_result,
            handle,
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn operation(&self) -> &UpdateOperation {
        &self.operation
    }

    /// The tentative outcome reported by the server.
    pub fn prepared_result(&self) -> &OutcomePayload {
        &self.prepared_result
    }

    pub fn commit(self) -> RolloutResult<()> {
        self.handle.commit()
    }

    pub fn rollback(self) -> RolloutResult<()> {
        self.handle.rollback()
    }

    /// Roll back an operation nobody will track. A failed rollback is only
    /// logged: the caller is already returning an error of its own.
    pub fn abandon(self, reason: &str) {
        let server = self.identity.clone();
        match self.rollback() {
            Ok(()) => debug!(server = %server, reason, "untracked operation rolled back"),
            Err(e) => {
                warn!(server = %server, reason, error = %e, "failed to roll back untracked operation")
            }
        }
    }
}

impl fmt::Debug for PreparedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedOperation")
            .field("identity", &self.identity)
            .field("operation", &self.operation)
            .field("prepared_result", &self.prepared_result)
            .finish_non_exhaustive()
    }
}

/// Dispatches server updates and tracks what is still awaiting resolution.
pub trait ServerTaskExecutor: Send + Sync {
    /// Send `task` to its target server and wait for the prepare phase.
    fn execute_task<'a>(
        &'a self,
        task: &'a ServerUpdateTask,
    ) -> BoxFuture<'a, RolloutResult<PreparedOperation>>;

    /// Take ownership of a prepared operation until the plan resolves it.
    ///
    /// On error the operation is not tracked, and the executor must have
    /// resolved it already (normally via [`PreparedOperation::abandon`]).
    fn record_prepared_operation(&self, prepared: PreparedOperation) -> RolloutResult<()>;
}

/// Transport seam: the management protocol client for remote servers.
pub trait ServerDispatcher: Send + Sync {
    fn prepare<'a>(
        &'a self,
        task: &'a ServerUpdateTask,
    ) -> BoxFuture<'a, RolloutResult<PreparedOperation>>;
}

/// Outcome of resolving every tracked prepared operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub committed: Vec<ServerIdentity>,
    pub rolled_back: Vec<ServerIdentity>,
    pub failed: Vec<(ServerIdentity, String)>,
}

/// [`ServerTaskExecutor`] over a [`ServerDispatcher`] that holds prepared
/// operations until [`TrackingExecutor::finalize`].
pub struct TrackingExecutor {
    dispatcher: Arc<dyn ServerDispatcher>,
    prepared: Mutex<BTreeMap<ServerIdentity, PreparedOperation>>,
}

impl TrackingExecutor {
    pub fn new(dispatcher: Arc<dyn ServerDispatcher>) -> Self {
        Self {
            dispatcher,
            prepared: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of prepared operations awaiting resolution.
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_prepared(&self, server: &ServerIdentity) -> bool {
        self.lock().contains_key(server)
    }

    /// Commit or roll back every tracked operation, then forget them.
    ///
    /// `should_roll_back` is consulted once per server.
    pub fn finalize(&self, should_roll_back: impl Fn(&ServerIdentity) -> bool) -> ResolutionReport {
        let prepared = std::mem::take(&mut *self.lock());
        let mut report = ResolutionReport::default();

        for (server, operation) in prepared {
            let roll_back = should_roll_back(&server);
            let resolved = if roll_back {
                operation.rollback()
            } else {
                operation.commit()
            };
            match resolved {
                Ok(()) if roll_back => report.rolled_back.push(server),
                Ok(()) => report.committed.push(server),
                Err(e) => {
                    warn!(server = %server, roll_back, error = %e, "failed to resolve prepared operation");
                    report.failed.push((server, e.to_string()));
                }
            }
        }

        info!(
            committed = report.committed.len(),
            rolled_back = report.rolled_back.len(),
            failed = report.failed.len(),
            "prepared operations resolved"
        );
        report
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ServerIdentity, PreparedOperation>> {
        self.prepared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServerTaskExecutor for TrackingExecutor {
    fn execute_task<'a>(
        &'a self,
        task: &'a ServerUpdateTask,
    ) -> BoxFuture<'a, RolloutResult<PreparedOperation>> {
        Box::pin(async move {
            let principal = current_subject().map(|s| s.principal);
            debug!(server = %task.target, ?principal, operation = %task.operation, "dispatching update");

            let prepared = self.dispatcher.prepare(task).await?;
            if prepared.identity() != &task.target {
                let reason = format!("prepared response came from {}", prepared.identity());
                prepared.abandon(&reason);
                return Err(RolloutError::Dispatch {
                    server: task.target.clone(),
                    reason,
                });
            }
            Ok(prepared)
        })
    }

    fn record_prepared_operation(&self, prepared: PreparedOperation) -> RolloutResult<()> {
        let mut tracked = self.lock();
        if tracked.contains_key(prepared.identity()) {
            let server = prepared.identity().clone();
            drop(tracked);
            prepared.abandon("already tracked");
            return Err(RolloutError::DuplicatePreparedOperation(server));
        }
        debug!(server = %prepared.identity(), "prepared operation tracked");
        tracked.insert(prepared.identity().clone(), prepared);
        Ok(())
    }
}
