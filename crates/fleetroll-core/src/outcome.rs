//! Outcome payloads reported per server.
//!
//! The payload is opaque to the rollout core except for the `outcome`
//! field. Every other field a remote server sends back is kept verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const OUTCOME: &str = "outcome";
pub const RESULT: &str = "result";
pub const FAILURE_DESCRIPTION: &str = "failure-description";

/// Value of the `outcome` field.
///
/// Servers may report values this crate has no name for (`rolled-back`,
/// for one); those are kept as [`Outcome::Other`] and written back
/// unchanged. Anything but [`Outcome::Success`] counts as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Success,
    Failed,
    /// Synthesized locally for servers skipped before dispatch.
    Cancelled,
    Other(String),
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(value),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => "success".to_string(),
            Outcome::Failed => "failed".to_string(),
            Outcome::Cancelled => "cancelled".to_string(),
            Outcome::Other(value) => value,
        }
    }
}

/// Structured per-server result: an `outcome` plus arbitrary extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomePayload {
    pub outcome: Outcome,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OutcomePayload {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            fields: Map::new(),
        }
    }

    /// A successful outcome carrying `result`.
    pub fn success(result: Value) -> Self {
        Self::new(Outcome::Success).with_field(RESULT, result)
    }

    /// A failed outcome carrying a human-readable description.
    pub fn failed(description: &str) -> Self {
        Self::new(Outcome::Failed).with_field(FAILURE_DESCRIPTION, Value::from(description))
    }

    /// `{"outcome": "cancelled"}` and nothing else.
    pub fn cancelled() -> Self {
        Self::new(Outcome::Cancelled)
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == Outcome::Cancelled
    }

    pub fn result(&self) -> Option<&Value> {
        self.fields.get(RESULT)
    }

    pub fn failure_description(&self) -> Option<&str> {
        self.fields.get(FAILURE_DESCRIPTION).and_then(Value::as_str)
    }
}
