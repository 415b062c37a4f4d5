//! Result handlers — observers of each server's terminal result.

use std::sync::{Mutex, MutexGuard, PoisonError};

use fleetroll_core::{OutcomePayload, ServerIdentity};

use crate::error::RolloutResult;

/// Notified once per server with its final (prepared or cancelled) result.
///
/// Independent of policy state: handlers observe progress, they never
/// steer it.
pub trait ServerUpdateResultHandler: Send + Sync {
    fn handle_server_update_result(
        &self,
        server: &ServerIdentity,
        result: &OutcomePayload,
    ) -> RolloutResult<()>;
}

/// Handler that keeps every notification in arrival order.
#[derive(Debug, Default)]
pub struct CollectingResultHandler {
    results: Mutex<Vec<(ServerIdentity, OutcomePayload)>>,
}

impl CollectingResultHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<(ServerIdentity, OutcomePayload)> {
        self.lock().clone()
    }

    pub fn result_for(&self, server: &ServerIdentity) -> Option<OutcomePayload> {
        self.lock()
            .iter()
            .find(|(id, _)| id == server)
            .map(|(_, result)| result.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ServerIdentity, OutcomePayload)>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServerUpdateResultHandler for CollectingResultHandler {
    fn handle_server_update_result(
        &self,
        server: &ServerIdentity,
        result: &OutcomePayload,
    ) -> RolloutResult<()> {
        self.lock().push((server.clone(), result.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_arrival_order() {
        let handler = CollectingResultHandler::new();
        let a = ServerIdentity::new("h", "g", "a");
        let b = ServerIdentity::new("h", "g", "b");

        handler
            .handle_server_update_result(&b, &OutcomePayload::cancelled())
            .unwrap();
        handler
            .handle_server_update_result(&a, &OutcomePayload::success(json!("ok")))
            .unwrap();

        let results = handler.results();
        assert_eq!(results[0].0, b);
        assert_eq!(results[1].0, a);
        assert!(handler.result_for(&b).unwrap().is_cancelled());
        assert!(handler.result_for(&ServerIdentity::new("h", "g", "c")).is_none());
    }
}
