//! Server identity — which managed server an update targets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one managed server within a server group on a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub host_name: String,
    pub server_group_name: String,
    pub server_name: String,
}

impl ServerIdentity {
    pub fn new(host_name: &str, server_group_name: &str, server_name: &str) -> Self {
        Self {
            host_name: host_name.to_string(),
            server_group_name: server_group_name.to_string(),
            server_name: server_name.to_string(),
        }
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.host_name, self.server_group_name, self.server_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn display_is_host_group_server() {
        let id = ServerIdentity::new("host-a", "main-group", "server-one");
        assert_eq!(id.to_string(), "host-a/main-group/server-one");
    }

    #[test]
    fn usable_as_map_key() {
        let mut results = HashMap::new();
        results.insert(ServerIdentity::new("h", "g", "s1"), 1);
        results.insert(ServerIdentity::new("h", "g", "s2"), 2);
        results.insert(ServerIdentity::new("h", "g", "s1"), 3);

        assert_eq!(results.len(), 2);
        assert_eq!(results[&ServerIdentity::new("h", "g", "s1")], 3);
    }

    #[test]
    fn same_server_name_on_other_host_is_distinct() {
        let a = ServerIdentity::new("host-a", "g", "s");
        let b = ServerIdentity::new("host-b", "g", "s");
        assert_ne!(a, b);
    }
}
