//! Command playbooks for sub-agent roles
//!
//! A playbook turns a delegation into concrete tool invocations. The
//! trait keeps the derivation pluggable; the shipped implementation is a
//! static per-role command table with target substitution.

use crate::agents::AgentRole;

/// One tool invocation a worker should attempt
#[derive(Debug, Clone)]
pub struct PlannedCall {
    /// Full command line (tokenized by the gateway)
    pub command: String,
    /// Whether the delegation fails terminally when this call does
    pub required: bool,
}

impl PlannedCall {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// First token of the command line
    pub fn executable(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or("")
    }
}

/// Maps (role, objective) to the tool invocations to run
pub trait Playbook: Send + Sync {
    fn plan(&self, role: AgentRole, objective: &str) -> Vec<PlannedCall>;
}

/// Static per-role command table.
///
/// Templates substitute `{target}` with the engagement target supplied
/// at construction. The objective only influences the plan through the
/// role the orchestrator picked for it.
pub struct StaticPlaybook {
    target: String,
}

impl StaticPlaybook {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    fn fill(&self, template: &str) -> PlannedCall {
        PlannedCall::new(template.replace("{target}", &self.target))
    }

    fn templates(role: AgentRole) -> &'static [&'static str] {
        match role {
            AgentRole::Recon => &["whois {target}", "dig {target}", "subfinder -d {target}"],
            AgentRole::ScanEnum => &["nmap -sV {target}", "fingerprintx -t {target}"],
            AgentRole::VulnMap => &["nuclei -u {target}", "sslscan {target}"],
            AgentRole::Exploit => &["sqlmap --batch -u http://{target}/"],
            AgentRole::PostExploit => &["nc -zv {target} 4444"],
            AgentRole::Pentest => &["nmap -sV {target}", "nuclei -u {target}"],
        }
    }
}

impl Playbook for StaticPlaybook {
    fn plan(&self, role: AgentRole, _objective: &str) -> Vec<PlannedCall> {
        Self::templates(role)
            .iter()
            .map(|t| self.fill(t))
            .collect()
    }
}
