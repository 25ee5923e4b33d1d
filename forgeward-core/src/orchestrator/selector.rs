//! Sub-agent selection
//!
//! Deciding which workers handle an objective is a pluggable decision
//! function. The shipped selector is keyword-driven so the control loop
//! can run without any model behind it.

use crate::agents::AgentRole;
use crate::state::ConversationThread;

/// Picks the sub-agents to dispatch for the current objective.
///
/// `round` counts dispatch rounds already completed for this objective;
/// returning an empty set ends the turn.
pub trait AgentSelector: Send + Sync {
    fn select(&self, objective: &str, thread: &ConversationThread, round: u32) -> Vec<AgentRole>;
}

/// Keyword-driven selector; dispatches once per objective
pub struct KeywordSelector;

impl AgentSelector for KeywordSelector {
    fn select(&self, objective: &str, _thread: &ConversationThread, round: u32) -> Vec<AgentRole> {
        if round > 0 {
            return Vec::new();
        }

        // Mark post-exploitation phrases first so the plain "exploit"
        // keyword does not double-match them
        let lower = objective
            .to_lowercase()
            .replace("post-exploit", "afterbreach")
            .replace("post exploit", "afterbreach");

        let mut roles = Vec::new();
        if lower.contains("recon") || lower.contains("discover") || lower.contains("footprint") {
            roles.push(AgentRole::Recon);
        }
        if lower.contains("scan") || lower.contains("enumerat") {
            roles.push(AgentRole::ScanEnum);
        }
        if lower.contains("vulnerab") {
            roles.push(AgentRole::VulnMap);
        }
        if lower.contains("exploit") {
            roles.push(AgentRole::Exploit);
        }
        if lower.contains("afterbreach") || lower.contains("privilege") {
            roles.push(AgentRole::PostExploit);
        }

        if roles.is_empty() {
            roles.push(AgentRole::Pentest);
        }
        roles
    }
}
