//! rollout.toml configuration parser.
//!
//! ```toml
//! in_series = true
//! rollback_across_groups = false
//!
//! [[server_groups]]
//! name = "main-server-group"
//! rolling_to_servers = true
//! max_failure_percentage = 20
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutPlanConfig {
    /// Roll groups out one after another instead of all at once.
    #[serde(default)]
    pub in_series: bool,
    /// A failure in any group rolls back every group.
    #[serde(default)]
    pub rollback_across_groups: bool,
    pub server_groups: Vec<ServerGroupConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerGroupConfig {
    pub name: String,
    /// Update one server at a time instead of the whole group concurrently.
    #[serde(default)]
    pub rolling_to_servers: bool,
    pub max_failed_servers: Option<u32>,
    pub max_failure_percentage: Option<u32>,
}

impl RolloutPlanConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        let config: RolloutPlanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A plan rolling every listed group concurrently with no failure tolerance.
    pub fn concurrent(groups: &[&str]) -> Self {
        Self {
            in_series: false,
            rollback_across_groups: false,
            server_groups: groups.iter().map(|g| ServerGroupConfig::new(g)).collect(),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.server_groups.is_empty() {
            return Err(CoreError::Invalid("no server groups".to_string()));
        }
        let mut seen = HashSet::new();
        for group in &self.server_groups {
            if group.name.is_empty() {
                return Err(CoreError::Invalid("server group with empty name".to_string()));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(CoreError::Invalid(format!(
                    "server group {} listed twice",
                    group.name
                )));
            }
            if let Some(pct) = group.max_failure_percentage {
                if pct > 100 {
                    return Err(CoreError::Invalid(format!(
                        "server group {}: max_failure_percentage {pct} exceeds 100",
                        group.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&ServerGroupConfig> {
        self.server_groups.iter().find(|g| g.name == name)
    }
}

impl ServerGroupConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rolling_to_servers: false,
            max_failed_servers: None,
            max_failure_percentage: None,
        }
    }

    pub fn rolling(mut self) -> Self {
        self.rolling_to_servers = true;
        self
    }

    pub fn with_max_failed_servers(mut self, max: u32) -> Self {
        self.max_failed_servers = Some(max);
        self
    }

    pub fn with_max_failure_percentage(mut self, pct: u32) -> Self {
        self.max_failure_percentage = Some(pct);
        self
    }

    /// Failures tolerated before the group is considered failed.
    ///
    /// An absolute count wins over a percentage; the percentage rounds down.
    pub fn max_failed(&self, server_count: usize) -> usize {
        if let Some(max) = self.max_failed_servers {
            return max as usize;
        }
        match self.max_failure_percentage {
            Some(pct) => server_count * pct as usize / 100,
            None => 0,
        }
    }
}
