//! Update policies — per-group failure accounting and plan-wide cancellation.
//!
//! A [`GroupUpdatePolicy`] is shared by every per-server operation of one
//! group rollout. It records exactly one result per server and flips to
//! failed once more servers failed than the group tolerates. A
//! [`RolloutPlanPolicy`] sits above the groups of a plan: once any group
//! fails, no further server anywhere in the plan is dispatched.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use fleetroll_core::{Outcome, OutcomePayload, ServerGroupConfig, ServerIdentity};

use crate::error::{RolloutError, RolloutResult};

/// Decision state for one server-group rollout.
///
/// Implementations are shared across concurrently running per-server
/// operations and must serialize their own updates.
pub trait ServerUpdatePolicy: Send + Sync {
    /// Whether `server` may still be dispatched.
    fn can_update_server(&self, server: &ServerIdentity) -> bool;

    /// Record the (prepared) result for `server`. Called once per server.
    fn record_server_result(
        &self,
        server: &ServerIdentity,
        result: &OutcomePayload,
    ) -> RolloutResult<()>;

    /// Whether the group exceeded its failure tolerance.
    fn is_failed(&self) -> bool;
}

#[derive(Debug, Default)]
struct GroupState {
    results: HashMap<ServerIdentity, Outcome>,
    failures: usize,
}

/// Failure-threshold policy for one server group.
#[derive(Debug)]
pub struct GroupUpdatePolicy {
    group: String,
    servers: HashSet<ServerIdentity>,
    max_failed: usize,
    parent: Option<Arc<RolloutPlanPolicy>>,
    state: Mutex<GroupState>,
}

impl GroupUpdatePolicy {
    /// Build a policy for `servers` using the thresholds in `config`.
    pub fn new(config: &ServerGroupConfig, servers: impl IntoIterator<Item = ServerIdentity>) -> Self {
        let servers: HashSet<_> = servers.into_iter().collect();
        let max_failed = config.max_failed(servers.len());
        Self {
            group: config.name.clone(),
            servers,
            max_failed,
            parent: None,
            state: Mutex::new(GroupState::default()),
        }
    }

    /// Report failure to, and honour cancellation from, a plan-level policy.
    pub fn with_parent(mut self, parent: Arc<RolloutPlanPolicy>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn max_failed(&self) -> usize {
        self.max_failed
    }

    pub fn failure_count(&self) -> usize {
        self.lock().failures
    }

    /// Snapshot of the outcomes recorded so far.
    pub fn recorded(&self) -> HashMap<ServerIdentity, Outcome> {
        self.lock().results.clone()
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        // Updates never panic mid-way, so a poisoned lock still holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parent_cancelled(&self) -> bool {
        self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

impl ServerUpdatePolicy for GroupUpdatePolicy {
    fn can_update_server(&self, server: &ServerIdentity) -> bool {
        if !self.servers.contains(server) || self.parent_cancelled() {
            return false;
        }
        let state = self.lock();
        state.failures <= self.max_failed && !state.results.contains_key(server)
    }

    fn record_server_result(
        &self,
        server: &ServerIdentity,
        result: &OutcomePayload,
    ) -> RolloutResult<()> {
        if !self.servers.contains(server) {
            return Err(RolloutError::UnknownServer(server.clone()));
        }

        let newly_failed = {
            let mut state = self.lock();
            if state.results.contains_key(server) {
                return Err(RolloutError::DuplicateResult(server.clone()));
            }
            state.results.insert(server.clone(), result.outcome.clone());
            if !result.is_success() {
                state.failures += 1;
            }
            !result.is_success() && state.failures == self.max_failed + 1
        };

        debug!(group = %self.group, server = %server, outcome = ?result.outcome, "server result recorded");

        if newly_failed {
            warn!(
                group = %self.group,
                max_failed = self.max_failed,
                "server group exceeded failure tolerance"
            );
            if let Some(parent) = &self.parent {
                parent.group_failed(&self.group);
            }
        }
        Ok(())
    }

    fn is_failed(&self) -> bool {
        self.lock().failures > self.max_failed
    }
}

/// Plan-wide policy shared by every group of one rollout plan.
#[derive(Debug, Default)]
pub struct RolloutPlanPolicy {
    rollback_across_groups: bool,
    failed_groups: Mutex<BTreeSet<String>>,
}

impl RolloutPlanPolicy {
    pub fn new(rollback_across_groups: bool) -> Self {
        Self {
            rollback_across_groups,
            failed_groups: Mutex::new(BTreeSet::new()),
        }
    }

    /// Mark `group` failed. Halts dispatch in every group of the plan.
    pub fn group_failed(&self, group: &str) {
        let inserted = self.lock().insert(group.to_string());
        if inserted {
            warn!(group, rollback_across_groups = self.rollback_across_groups, "rollout plan cancelled");
        }
    }

    /// True once any group failed.
    pub fn is_cancelled(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Whether the prepared operation on `server` must be rolled back.
    pub fn should_roll_back(&self, server: &ServerIdentity) -> bool {
        let failed = self.lock();
        failed.contains(&server.server_group_name) || (self.rollback_across_groups && !failed.is_empty())
    }

    pub fn failed_groups(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.failed_groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
