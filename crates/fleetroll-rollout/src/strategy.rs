//! Rollout strategies — concurrent and rolling dispatch across a group.

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::error::RolloutResult;
use crate::executor::BoxFuture;
use crate::task::{RolloutStrategy, RolloutTask};

/// Update every server of the group at once.
///
/// Servers the policy already rejects are cancelled up front. Every
/// dispatched server is recorded, prepared or failed, even when recording
/// an earlier peer went wrong; the first recording error is returned once
/// all of them have been seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrentStrategy;

impl RolloutStrategy for ConcurrentStrategy {
    fn name(&self) -> &'static str {
        "concurrent"
    }

    fn execute<'a>(&'a self, rollout: &'a RolloutTask) -> BoxFuture<'a, RolloutResult<()>> {
        Box::pin(async move {
            let mut dispatched = Vec::with_capacity(rollout.tasks().len());
            for task in rollout.tasks() {
                if rollout.policy().can_update_server(&task.target) {
                    dispatched.push(task);
                } else {
                    rollout.send_cancelled_response(&task.target)?;
                }
            }

            info!(servers = dispatched.len(), "dispatching server updates concurrently");
            let prepared =
                join_all(dispatched.iter().map(|&task| rollout.executor().execute_task(task))).await;

            let mut first_failure = None;
            for (task, prepared) in dispatched.iter().zip(prepared) {
                let recorded = match prepared {
                    Ok(op) => rollout.record_prepared_operation(&task.target, op),
                    Err(e) => rollout.record_dispatch_failure(&task.target, &e),
                };
                if let Err(e) = recorded {
                    debug!(server = %task.target, error = %e, "server result not recorded");
                    first_failure.get_or_insert(e);
                }
            }

            match first_failure {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}

/// Update one server at a time, in task order.
///
/// Before each dispatch the policy is consulted; once it rejects further
/// work, every remaining server is cancelled. A server that cannot be
/// reached is recorded as failed and counts against the policy like any
/// other failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingStrategy;

impl RolloutStrategy for RollingStrategy {
    fn name(&self) -> &'static str {
        "rolling"
    }

    fn execute<'a>(&'a self, rollout: &'a RolloutTask) -> BoxFuture<'a, RolloutResult<()>> {
        Box::pin(async move {
            for (position, task) in rollout.tasks().iter().enumerate() {
                if !rollout.policy().can_update_server(&task.target) {
                    rollout.send_cancelled_response(&task.target)?;
                    continue;
                }
                debug!(
                    server = %task.target,
                    position = position + 1,
                    total = rollout.tasks().len(),
                    "rolling to next server"
                );
                match rollout.executor().execute_task(task).await {
                    Ok(prepared) => rollout.record_prepared_operation(&task.target, prepared)?,
                    Err(e) => rollout.record_dispatch_failure(&task.target, &e)?,
                }
            }
            Ok(())
        })
    }
}
