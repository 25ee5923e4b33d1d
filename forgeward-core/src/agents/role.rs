//! Sub-agent roles and their per-role configuration

use serde::{Deserialize, Serialize};

/// The fixed set of worker roles.
///
/// All roles share one execution contract; they differ only in which
/// tool subset they may call and which documentation scope they consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Recon,
    ScanEnum,
    VulnMap,
    Exploit,
    PostExploit,
    Pentest,
}

impl AgentRole {
    /// Every role, in workflow order
    pub const ALL: [AgentRole; 6] = [
        AgentRole::Recon,
        AgentRole::ScanEnum,
        AgentRole::VulnMap,
        AgentRole::Exploit,
        AgentRole::PostExploit,
        AgentRole::Pentest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Recon => "recon",
            AgentRole::ScanEnum => "scan_enum",
            AgentRole::VulnMap => "vuln_map",
            AgentRole::Exploit => "exploit",
            AgentRole::PostExploit => "post_exploit",
            AgentRole::Pentest => "pentest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recon" => Some(AgentRole::Recon),
            "scan_enum" => Some(AgentRole::ScanEnum),
            "vuln_map" => Some(AgentRole::VulnMap),
            "exploit" => Some(AgentRole::Exploit),
            "post_exploit" => Some(AgentRole::PostExploit),
            "pentest" => Some(AgentRole::Pentest),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-role configuration consumed at worker construction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Tools this role is permitted to invoke (first token of a command)
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Documentation scope consulted before running tools
    #[serde(default)]
    pub docs_scope: String,
}

impl RoleConfig {
    pub fn new(allowed_tools: Vec<String>, docs_scope: impl Into<String>) -> Self {
        Self {
            allowed_tools,
            docs_scope: docs_scope.into(),
        }
    }

    /// Whether `executable` is in this role's allow-list
    pub fn permits(&self, executable: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == executable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in AgentRole::ALL {
            assert_eq!(AgentRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(AgentRole::from_str("wizard"), None);
    }

    #[test]
    fn test_role_serde_names() {
        let json = serde_json::to_string(&AgentRole::PostExploit).unwrap();
        assert_eq!(json, "\"post_exploit\"");
    }

    #[test]
    fn test_role_config_permits() {
        let config = RoleConfig::new(vec!["nmap".to_string(), "gobuster".to_string()], "scan_enum");
        assert!(config.permits("nmap"));
        assert!(!config.permits("sqlmap"));
    }
}
