//! Execution identity — who a rollout runs as.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Principal and credentials bundle propagated to every downstream call
/// made while a rollout executes.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub principal: String,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

impl Subject {
    pub fn new(principal: &str) -> Self {
        Self {
            principal: principal.to_string(),
            ..Default::default()
        }
    }

    pub fn with_credential(mut self, key: &str, value: &str) -> Self {
        self.credentials.insert(key.to_string(), value.to_string());
        self
    }
}

// Credentials never reach log output.
impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("principal", &self.principal)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}
