//! Rollout task — updates the servers of one server group.
//!
//! A [`RolloutTask`] owns everything one group rollout needs: the
//! per-server tasks, the group's policy, the executor, the result handler
//! and the subject it runs as. The ordering and concurrency of dispatch is
//! left to a [`RolloutStrategy`], which reports back through the two
//! recording primitives:
//!
//! ```text
//! pending ──record_prepared_operation──▶ prepared   (policy, executor, handler)
//!    ├─────record_dispatch_failure────▶ failed     (policy, handler)
//!    └─────send_cancelled_response────▶ cancelled  (handler only)
//! ```
//!
//! [`RolloutTask::run`] is the only entry point and never fails: errors and
//! panics from the strategy are logged and swallowed so that one group's
//! failure cannot take down the pool it runs on.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use fleetroll_core::{OutcomePayload, ServerIdentity, ServerUpdateTask, Subject};

use crate::context::with_subject;
use crate::error::{RolloutError, RolloutResult};
use crate::executor::{BoxFuture, PreparedOperation, ServerTaskExecutor};
use crate::handler::ServerUpdateResultHandler;
use crate::policy::ServerUpdatePolicy;

/// Decides the order and parallelism in which a rollout's servers are
/// dispatched.
///
/// Implementations drive each task through `rollout.executor()` and end
/// every server in exactly one of [`RolloutTask::record_prepared_operation`],
/// [`RolloutTask::record_dispatch_failure`] or
/// [`RolloutTask::send_cancelled_response`].
pub trait RolloutStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute<'a>(&'a self, rollout: &'a RolloutTask) -> BoxFuture<'a, RolloutResult<()>>;
}

/// One server-group rollout.
pub struct RolloutTask {
    tasks: Vec<ServerUpdateTask>,
    policy: Arc<dyn ServerUpdatePolicy>,
    executor: Arc<dyn ServerTaskExecutor>,
    result_handler: Arc<dyn ServerUpdateResultHandler>,
    subject: Subject,
    strategy: Arc<dyn RolloutStrategy>,
}

impl RolloutTask {
    /// Assemble a rollout. `tasks` is expected to be non-empty with one
    /// task per server.
    pub fn new(
        tasks: Vec<ServerUpdateTask>,
        policy: Arc<dyn ServerUpdatePolicy>,
        executor: Arc<dyn ServerTaskExecutor>,
        result_handler: Arc<dyn ServerUpdateResultHandler>,
        subject: Subject,
        strategy: Arc<dyn RolloutStrategy>,
    ) -> Self {
        Self {
            tasks,
            policy,
            executor,
            result_handler,
            subject,
            strategy,
        }
    }

    pub fn tasks(&self) -> &[ServerUpdateTask] {
        &self.tasks
    }

    pub fn policy(&self) -> &dyn ServerUpdatePolicy {
        self.policy.as_ref()
    }

    pub fn executor(&self) -> &dyn ServerTaskExecutor {
        self.executor.as_ref()
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Execute the strategy as [`Self::subject`]. Never fails.
    pub async fn run(&self) {
        let group = self
            .tasks
            .first()
            .map(|t| t.target.server_group_name.as_str())
            .unwrap_or_default();
        let span = info_span!(
            "rollout",
            group,
            strategy = self.strategy.name(),
            principal = %self.subject.principal,
            servers = self.tasks.len(),
        );

        let execution = with_subject(self.subject.clone(), self.strategy.execute(self));
        let outcome = AssertUnwindSafe(execution)
            .catch_unwind()
            .instrument(span.clone())
            .await;

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        let operation = self
            .tasks
            .first()
            .map(|t| t.operation.to_string())
            .unwrap_or_default();
        span.in_scope(|| debug!(%operation, error = %failure, "failed to process task"));
    }

    /// Run on the tokio pool.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Record a server's prepared operation.
    ///
    /// Updates the policy, hands the operation to the executor for later
    /// resolution, then notifies the result handler, in that order. The
    /// first failing step stops the sequence. If the policy refuses the
    /// result the operation never reaches the executor and is rolled back
    /// here; past that point the executor owns it.
    pub fn record_prepared_operation(
        &self,
        server: &ServerIdentity,
        prepared: PreparedOperation,
    ) -> RolloutResult<()> {
        let prepared_result = prepared.prepared_result().clone();
        if let Err(e) = self.policy.record_server_result(server, &prepared_result) {
            prepared.abandon("policy refused result");
            return Err(e);
        }
        self.executor.record_prepared_operation(prepared)?;
        self.result_handler
            .handle_server_update_result(server, &prepared_result)?;
        Ok(())
    }

    /// Record that `server` could not be prepared at all.
    ///
    /// The dispatch error becomes a `failed` result, counted by the policy
    /// and passed to the result handler. Nothing reaches the executor since
    /// there is no operation to resolve.
    pub fn record_dispatch_failure(
        &self,
        server: &ServerIdentity,
        error: &RolloutError,
    ) -> RolloutResult<()> {
        warn!(server = %server, error = %error, "server update not prepared");
        let failed = OutcomePayload::failed(&error.to_string());
        self.policy.record_server_result(server, &failed)?;
        self.result_handler.handle_server_update_result(server, &failed)
    }

    /// Report `server` as cancelled without it ever having been dispatched.
    ///
    /// Only the result handler hears about it: there is no prepared
    /// operation to track and no result for the policy to count.
    pub fn send_cancelled_response(&self, server: &ServerIdentity) -> RolloutResult<()> {
        debug!(server = %server, "server update cancelled");
        self.result_handler
            .handle_server_update_result(server, &OutcomePayload::cancelled())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
