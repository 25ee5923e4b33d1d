//! Conversation thread model
//!
//! A thread is the durable, append-only record of one session: its turns
//! and the findings merged in by the orchestrator. The store owns the
//! canonical copy; the orchestrator holds only the thread id between
//! turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::AgentRole;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

/// One entry in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// How a finding came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    /// All tool calls for the delegation succeeded
    Success,
    /// Some calls exhausted retries but the worker still reported
    Degraded,
    /// The delegation failed terminally; summary carries the reason
    Failed,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Success => "success",
            FindingKind::Degraded => "degraded",
            FindingKind::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FindingKind::Success),
            "degraded" => Some(FindingKind::Degraded),
            "failed" => Some(FindingKind::Failed),
            _ => None,
        }
    }
}

/// A result reported by one sub-agent for one delegation.
///
/// Findings accumulate append-only inside a thread and are never mutated
/// after the merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub source_agent: AgentRole,
    pub summary: String,
    pub kind: FindingKind,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn success(source_agent: AgentRole, summary: impl Into<String>) -> Self {
        Self {
            source_agent,
            summary: summary.into(),
            kind: FindingKind::Success,
            timestamp: Utc::now(),
        }
    }

    pub fn degraded(source_agent: AgentRole, summary: impl Into<String>) -> Self {
        Self {
            source_agent,
            summary: summary.into(),
            kind: FindingKind::Degraded,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(source_agent: AgentRole, reason: impl Into<String>) -> Self {
        Self {
            source_agent,
            summary: reason.into(),
            kind: FindingKind::Failed,
            timestamp: Utc::now(),
        }
    }
}

/// Durable record of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub thread_id: String,
    pub turns: Vec<Turn>,
    pub findings: Vec<Finding>,
}

impl ConversationThread {
    /// Create an empty thread with the given id
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            turns: Vec::new(),
            findings: Vec::new(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    /// Append a finding; findings are never removed or rewritten
    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// The most recent user objective, if any
    pub fn last_objective(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::User)
            .map(|t| t.content.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_turns_in_order() {
        let mut thread = ConversationThread::new("t-1");
        thread.push_user("scan the target");
        thread.push_assistant("done");

        assert_eq!(thread.turns.len(), 2);
        assert_eq!(thread.turns[0].role, TurnRole::User);
        assert_eq!(thread.turns[1].role, TurnRole::Assistant);
        assert_eq!(thread.last_objective(), Some("scan the target"));
    }

    #[test]
    fn test_findings_append_only() {
        let mut thread = ConversationThread::new("t-2");
        thread.add_finding(Finding::success(AgentRole::Recon, "two hosts up"));
        thread.add_finding(Finding::failed(AgentRole::Exploit, "tool unavailable"));

        assert_eq!(thread.findings.len(), 2);
        assert_eq!(thread.findings[0].kind, FindingKind::Success);
        assert_eq!(thread.findings[1].kind, FindingKind::Failed);
        assert_eq!(thread.findings[1].source_agent, AgentRole::Exploit);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            FindingKind::Success,
            FindingKind::Degraded,
            FindingKind::Failed,
        ] {
            assert_eq!(FindingKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(FindingKind::from_str("bogus"), None);
    }
}
