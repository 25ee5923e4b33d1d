//! Configuration types for forgeward sessions

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agents::{AgentRole, RoleConfig};
use crate::docs::DocEntry;
use crate::orchestrator::DEFAULT_MAX_ROUNDS;
use crate::retry::{OnExhaustion, RetryConfig, RetryPolicy};

/// Execution gateway endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default command timeout sent with each request
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Explicit base URL; overrides host/port when set (remote gateways)
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9756
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

impl GatewayConfig {
    /// Base URL clients should use to reach the gateway
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

/// Retry middleware settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub on_exhaustion: OnExhaustion,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            on_exhaustion: OnExhaustion::default(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetrySettings {
    /// Build the runtime policy for one middleware instance
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            on_exhaustion: self.on_exhaustion,
            backoff: RetryConfig {
                initial_delay: Duration::from_millis(self.initial_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                jitter: self.jitter,
            },
        }
    }
}

/// Control-loop bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_rounds")]
    pub max_dispatch_rounds: u32,
    /// Optional wall-clock budget per objective, in seconds
    #[serde(default)]
    pub objective_deadline_secs: Option<u64>,
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_dispatch_rounds: default_max_rounds(),
            objective_deadline_secs: None,
        }
    }
}

/// Complete session configuration, immutable for the process lifetime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Engagement target host or domain
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Per-role tool allow-lists; missing roles get built-in defaults
    #[serde(default)]
    pub roles: HashMap<AgentRole, RoleConfig>,
    /// Tool documentation entries for the lookup index
    #[serde(default)]
    pub docs: Vec<DocEntry>,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from default locations with cascade:
    /// 1. ./forgeward.toml (local override)
    /// 2. ~/.forgeward/config.toml (global defaults)
    /// 3. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(config) = Self::from_file("forgeward.toml") {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let global_path = home.join(".forgeward").join("config.toml");
            if let Ok(config) = Self::from_file(&global_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".forgeward").join("config.toml"))
    }

    /// Allow-list and docs scope for `role`, falling back to built-ins
    pub fn role_config(&self, role: AgentRole) -> RoleConfig {
        self.roles
            .get(&role)
            .cloned()
            .unwrap_or_else(|| default_role_config(role))
    }
}

/// Common utilities every role may call alongside its specialty tools
const GENERAL_TOOLS: &[&str] = &["curl", "httpie", "python3", "echo", "sh"];

/// Built-in per-role tool catalogs
fn default_role_config(role: AgentRole) -> RoleConfig {
    let specialty: &[&str] = match role {
        AgentRole::Recon => &[
            "whois",
            "dig",
            "nslookup",
            "dnsrecon",
            "assetfinder",
            "findomain",
            "subfinder",
        ],
        AgentRole::ScanEnum => &[
            "nmap",
            "masscan",
            "enum4linux-ng",
            "gobuster",
            "wpscan",
            "fingerprintx",
        ],
        AgentRole::VulnMap => &["nuclei", "sslscan"],
        AgentRole::Exploit => &["sqlmap", "hydra", "medusa", "ncrack"],
        AgentRole::PostExploit => &["nc", "socat", "hping3", "psexec", "smbclient"],
        AgentRole::Pentest => &[
            "whois", "dig", "subfinder", "nmap", "gobuster", "nuclei", "sslscan", "sqlmap",
        ],
    };

    let allowed = specialty
        .iter()
        .chain(GENERAL_TOOLS)
        .map(|s| s.to_string())
        .collect();
    RoleConfig::new(allowed, role.as_str())
}
