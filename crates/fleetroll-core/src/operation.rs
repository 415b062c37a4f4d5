//! Update operations and the per-server tasks that carry them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::ServerIdentity;

/// Opaque update descriptor handed to the management protocol as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateOperation(Value);

impl UpdateOperation {
    pub fn new(descriptor: Value) -> Self {
        Self(descriptor)
    }

    pub fn descriptor(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for UpdateOperation {
    fn from(descriptor: Value) -> Self {
        Self(descriptor)
    }
}

/// Compact JSON, so log lines identify the operation without pretty-printing.
impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One update operation bound to the server it must be applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerUpdateTask {
    pub operation: UpdateOperation,
    pub target: ServerIdentity,
}

impl ServerUpdateTask {
    pub fn new(target: ServerIdentity, operation: UpdateOperation) -> Self {
        Self { operation, target }
    }
}
