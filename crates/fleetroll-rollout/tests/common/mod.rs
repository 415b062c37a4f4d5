//! Shared fixtures for rollout integration tests.
//!
//! Every mock collaborator writes into one [`Journal`] so tests can assert
//! on the exact order of calls across policy, executor and handler.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use fleetroll_core::{OutcomePayload, ServerIdentity, ServerUpdateTask, UpdateOperation};
use fleetroll_rollout::{
    BoxFuture, PreparedOperation, RolloutError, RolloutResult, ServerDispatcher,
    ServerTaskExecutor, ServerUpdatePolicy, ServerUpdateResultHandler, TransactionHandle,
    current_subject,
};

pub const GROUP: &str = "main-server-group";

pub fn server(name: &str) -> ServerIdentity {
    ServerIdentity::new("host-1", GROUP, name)
}

pub fn task(name: &str) -> ServerUpdateTask {
    task_in(GROUP, name)
}

pub fn task_in(group: &str, name: &str) -> ServerUpdateTask {
    ServerUpdateTask::new(
        ServerIdentity::new("host-1", group, name),
        UpdateOperation::new(json!({"operation": "write-attribute", "server": name})),
    )
}

// ── Call journal ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Dispatch(ServerIdentity),
    PolicyRecord(ServerIdentity, OutcomePayload),
    ExecutorRecord(ServerIdentity, OutcomePayload),
    HandlerNotify(ServerIdentity, OutcomePayload),
    Commit(ServerIdentity),
    Rollback(ServerIdentity),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn policy_records(&self) -> Vec<ServerIdentity> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PolicyRecord(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn executor_records(&self) -> Vec<ServerIdentity> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ExecutorRecord(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn rollbacks(&self) -> Vec<ServerIdentity> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Rollback(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<(ServerIdentity, OutcomePayload)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::HandlerNotify(id, result) => Some((id, result)),
                _ => None,
            })
            .collect()
    }
}

fn injected(server: &ServerIdentity, what: &str) -> RolloutError {
    RolloutError::ResultHandler {
        server: server.clone(),
        reason: format!("injected {what} failure"),
    }
}

// ── Policy ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPolicy {
    pub journal: Journal,
    /// Servers `can_update_server` rejects.
    pub rejected: HashSet<ServerIdentity>,
    pub fail_record: bool,
}

impl ServerUpdatePolicy for MockPolicy {
    fn can_update_server(&self, server: &ServerIdentity) -> bool {
        !self.rejected.contains(server)
    }

    fn record_server_result(
        &self,
        server: &ServerIdentity,
        result: &OutcomePayload,
    ) -> RolloutResult<()> {
        if self.fail_record {
            return Err(injected(server, "policy"));
        }
        self.journal
            .push(Call::PolicyRecord(server.clone(), result.clone()));
        Ok(())
    }

    fn is_failed(&self) -> bool {
        false
    }
}

// ── Executor / dispatcher ───────────────────────────────────────────

pub struct JournalHandle {
    pub server: ServerIdentity,
    pub journal: Journal,
}

impl TransactionHandle for JournalHandle {
    fn commit(self: Box<Self>) -> RolloutResult<()> {
        self.journal.push(Call::Commit(self.server.clone()));
        Ok(())
    }

    fn rollback(self: Box<Self>) -> RolloutResult<()> {
        self.journal.push(Call::Rollback(self.server.clone()));
        Ok(())
    }
}

pub fn prepared_with(
    server: &ServerIdentity,
    result: OutcomePayload,
    journal: &Journal,
) -> PreparedOperation {
    PreparedOperation::new(
        server.clone(),
        UpdateOperation::new(json!({"operation": "write-attribute"})),
        result,
        Box::new(JournalHandle {
            server: server.clone(),
            journal: journal.clone(),
        }),
    )
}

/// Answers every prepare from a table of outcomes; missing entries succeed.
#[derive(Default)]
pub struct ScriptedRemote {
    pub journal: Journal,
    pub outcomes: HashMap<ServerIdentity, OutcomePayload>,
    pub unreachable: HashSet<ServerIdentity>,
    /// Principal seen by each dispatch.
    pub principals: Mutex<Vec<Option<String>>>,
}

impl ScriptedRemote {
    fn answer(&self, task: &ServerUpdateTask) -> RolloutResult<PreparedOperation> {
        self.principals
            .lock()
            .unwrap()
            .push(current_subject().map(|s| s.principal));
        self.journal.push(Call::Dispatch(task.target.clone()));
        if self.unreachable.contains(&task.target) {
            return Err(RolloutError::Dispatch {
                server: task.target.clone(),
                reason: "connection refused".to_string(),
            });
        }
        let result = self
            .outcomes
            .get(&task.target)
            .cloned()
            .unwrap_or_else(|| OutcomePayload::success(json!("ok")));
        Ok(prepared_with(&task.target, result, &self.journal))
    }
}

impl ServerDispatcher for ScriptedRemote {
    fn prepare<'a>(
        &'a self,
        task: &'a ServerUpdateTask,
    ) -> BoxFuture<'a, RolloutResult<PreparedOperation>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.answer(task)
        })
    }
}

/// Executor that journals recorded operations instead of tracking them.
#[derive(Default)]
pub struct MockExecutor {
    pub remote: ScriptedRemote,
    pub fail_record: bool,
}

impl ServerTaskExecutor for MockExecutor {
    fn execute_task<'a>(
        &'a self,
        task: &'a ServerUpdateTask,
    ) -> BoxFuture<'a, RolloutResult<PreparedOperation>> {
        self.remote.prepare(task)
    }

    fn record_prepared_operation(&self, prepared: PreparedOperation) -> RolloutResult<()> {
        if self.fail_record {
            let err = injected(prepared.identity(), "executor");
            prepared.abandon("executor refused operation");
            return Err(err);
        }
        self.remote.journal.push(Call::ExecutorRecord(
            prepared.identity().clone(),
            prepared.prepared_result().clone(),
        ));
        Ok(())
    }
}

// ── Result handler ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockHandler {
    pub journal: Journal,
    pub fail: bool,
}

impl ServerUpdateResultHandler for MockHandler {
    fn handle_server_update_result(
        &self,
        server: &ServerIdentity,
        result: &OutcomePayload,
    ) -> RolloutResult<()> {
        if self.fail {
            return Err(injected(server, "handler"));
        }
        self.journal
            .push(Call::HandlerNotify(server.clone(), result.clone()));
        Ok(())
    }
}

// ── Log capture ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, String>,
}

/// `tracing` layer that keeps every event it sees.
#[derive(Debug, Clone, Default)]
pub struct EventCapture(Arc<Mutex<Vec<CapturedEvent>>>);

impl EventCapture {
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.message == message)
            .cloned()
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let message = visitor.0.remove("message").unwrap_or_default();
        self.0.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields: visitor.0,
        });
    }
}

#[derive(Default)]
struct FieldVisitor(HashMap<String, String>);

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}
