//! Rollout plan — runs one rollout task per server group.
//!
//! The plan splits the update tasks by server group, gives every group its
//! own [`GroupUpdatePolicy`] under a shared [`RolloutPlanPolicy`], and runs
//! the groups in series or concurrently. All groups share one
//! [`TrackingExecutor`]; once every group has finished, its prepared
//! operations are committed, or rolled back where the plan policy says so.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use fleetroll_core::{OutcomePayload, RolloutPlanConfig, ServerIdentity, ServerUpdateTask, Subject};

use crate::error::{RolloutError, RolloutResult};
use crate::executor::{ResolutionReport, ServerDispatcher, TrackingExecutor};
use crate::handler::CollectingResultHandler;
use crate::policy::{GroupUpdatePolicy, RolloutPlanPolicy};
use crate::strategy::{ConcurrentStrategy, RollingStrategy};
use crate::task::{RolloutStrategy, RolloutTask};

/// What a finished plan did to every server.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    /// Every handler notification, in arrival order.
    pub results: Vec<(ServerIdentity, OutcomePayload)>,
    pub resolution: ResolutionReport,
    pub failed_groups: Vec<String>,
    /// Planned servers that never got a terminal result.
    pub unresolved: Vec<ServerIdentity>,
}

impl PlanOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed_groups.is_empty()
            && self.resolution.failed.is_empty()
            && self.unresolved.is_empty()
    }

    pub fn result_for(&self, server: &ServerIdentity) -> Option<&OutcomePayload> {
        self.results
            .iter()
            .find(|(id, _)| id == server)
            .map(|(_, result)| result)
    }
}

/// A validated set of server updates plus the config describing how to
/// roll them out.
#[derive(Debug, Clone)]
pub struct RolloutPlan {
    config: RolloutPlanConfig,
    tasks: Vec<ServerUpdateTask>,
    subject: Subject,
}

impl RolloutPlan {
    /// Every task must target a group named in `config`, and no server may
    /// appear twice.
    pub fn new(
        config: RolloutPlanConfig,
        tasks: Vec<ServerUpdateTask>,
        subject: Subject,
    ) -> RolloutResult<Self> {
        config.validate()?;

        let mut seen = HashSet::new();
        for task in &tasks {
            if config.group(&task.target.server_group_name).is_none() {
                return Err(RolloutError::UnknownGroup(
                    task.target.server_group_name.clone(),
                ));
            }
            if !seen.insert(&task.target) {
                return Err(RolloutError::DuplicateTask(task.target.clone()));
            }
        }

        Ok(Self {
            config,
            tasks,
            subject,
        })
    }

    pub fn config(&self) -> &RolloutPlanConfig {
        &self.config
    }

    /// Run every group through `dispatcher`, then resolve what was prepared.
    pub async fn execute(&self, dispatcher: Arc<dyn ServerDispatcher>) -> PlanOutcome {
        let plan_policy = Arc::new(RolloutPlanPolicy::new(self.config.rollback_across_groups));
        let executor = Arc::new(TrackingExecutor::new(dispatcher));
        let handler = Arc::new(CollectingResultHandler::new());

        let rollouts = self.group_rollouts(&plan_policy, &executor, &handler);
        info!(
            groups = rollouts.len(),
            in_series = self.config.in_series,
            principal = %self.subject.principal,
            "starting rollout plan"
        );

        if self.config.in_series {
            for rollout in &rollouts {
                rollout.run().await;
            }
        } else {
            let handles: Vec<_> = rollouts.into_iter().map(RolloutTask::spawn).collect();
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "rollout task did not complete");
                }
            }
        }

        let resolution = executor.finalize(|server| plan_policy.should_roll_back(server));
        let results = handler.results();
        let reported: HashSet<&ServerIdentity> = results.iter().map(|(id, _)| id).collect();
        let unresolved: Vec<ServerIdentity> = self
            .tasks
            .iter()
            .map(|t| &t.target)
            .filter(|id| !reported.contains(id))
            .cloned()
            .collect();
        if !unresolved.is_empty() {
            warn!(servers = unresolved.len(), "servers finished without a result");
        }
        let outcome = PlanOutcome {
            failed_groups: plan_policy.failed_groups(),
            resolution,
            unresolved,
            results,
        };
        info!(
            succeeded = outcome.succeeded(),
            failed_groups = ?outcome.failed_groups,
            "rollout plan finished"
        );
        outcome
    }

    fn group_rollouts(
        &self,
        plan_policy: &Arc<RolloutPlanPolicy>,
        executor: &Arc<TrackingExecutor>,
        handler: &Arc<CollectingResultHandler>,
    ) -> Vec<RolloutTask> {
        self.config
            .server_groups
            .iter()
            .filter_map(|group| {
                let tasks: Vec<ServerUpdateTask> = self
                    .tasks
                    .iter()
                    .filter(|t| t.target.server_group_name == group.name)
                    .cloned()
                    .collect();
                if tasks.is_empty() {
                    return None;
                }

                let policy = GroupUpdatePolicy::new(group, tasks.iter().map(|t| t.target.clone()))
                    .with_parent(plan_policy.clone());
                let strategy: Arc<dyn RolloutStrategy> = if group.rolling_to_servers {
                    Arc::new(RollingStrategy)
                } else {
                    Arc::new(ConcurrentStrategy)
                };

                Some(RolloutTask::new(
                    tasks,
                    Arc::new(policy),
                    executor.clone(),
                    handler.clone(),
                    self.subject.clone(),
                    strategy,
                ))
            })
            .collect()
    }
}
