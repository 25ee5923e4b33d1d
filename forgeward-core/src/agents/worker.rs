//! Sub-agent worker execution
//!
//! A worker accepts one delegation, consults documentation, runs its
//! playbook's tool invocations through the gateway client (each wrapped
//! individually in retry middleware), and reports a best-effort finding.
//! Only a required call exhausting retries in abort mode is terminal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agents::playbook::{Playbook, PlannedCall};
use crate::agents::role::{AgentRole, RoleConfig};
use crate::docs::DocIndex;
use crate::retry::{with_retry, RetryOutcome, RetryPolicy};
use crate::state::Finding;
use crate::tools::{ExecCommand, ToolClient};
use crate::{Error, Result};

/// Output kept per tool call before folding into the finding summary
const MAX_OUTPUT_CHARS: usize = 2000;

/// A single unit of work routed from the orchestrator to one worker.
///
/// Created per dispatch decision and consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDelegation {
    pub id: String,
    pub role: AgentRole,
    pub objective: String,
    pub created_at: DateTime<Utc>,
}

impl TaskDelegation {
    pub fn new(role: AgentRole, objective: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            objective: objective.into(),
            created_at: Utc::now(),
        }
    }
}

/// A role-specialized task executor
pub struct SubAgent {
    role: AgentRole,
    config: RoleConfig,
    client: Arc<ToolClient>,
    docs: Arc<dyn DocIndex>,
    playbook: Arc<dyn Playbook>,
    retry: RetryPolicy,
    tool_timeout_secs: u64,
}

impl SubAgent {
    pub fn new(
        role: AgentRole,
        config: RoleConfig,
        client: Arc<ToolClient>,
        docs: Arc<dyn DocIndex>,
        playbook: Arc<dyn Playbook>,
        retry: RetryPolicy,
        tool_timeout_secs: u64,
    ) -> Self {
        Self {
            role,
            config,
            client,
            docs,
            playbook,
            retry,
            tool_timeout_secs,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    /// Execute one delegation and return a finding.
    ///
    /// Tool calls run concurrently; their outputs are folded back in
    /// playbook order so the summary is deterministic.
    pub async fn run(&self, delegation: &TaskDelegation) -> Result<Finding> {
        debug!(role = %self.role, delegation = %delegation.id, "worker starting");

        let snippets = self.docs.query(&delegation.objective, 3);
        if !snippets.is_empty() {
            debug!(
                role = %self.role,
                docs = ?snippets.iter().map(|s| s.title.as_str()).collect::<Vec<_>>(),
                "consulted documentation"
            );
        }

        let plan = self.playbook.plan(self.role, &delegation.objective);
        let mut sections: Vec<String> = Vec::new();
        let mut degraded = false;

        let mut permitted: Vec<PlannedCall> = Vec::new();
        for call in plan {
            if self.config.permits(call.executable()) {
                permitted.push(call);
            } else {
                warn!(role = %self.role, tool = call.executable(), "tool not in allow-list, skipped");
                sections.push(format!("{}: skipped (not permitted)", call.executable()));
            }
        }

        // Fan out into a set owned by this future, then fold results back
        // in plan order. Dropping the set (worker cancelled) aborts every
        // in-flight call with it.
        let mut calls = tokio::task::JoinSet::new();
        for (idx, call) in permitted.iter().enumerate() {
            let client = Arc::clone(&self.client);
            let policy = self.retry.clone();
            let command = ExecCommand::Line(call.command.clone());
            let timeout = self.tool_timeout_secs;
            calls.spawn(async move {
                (idx, with_retry(&policy, || client.invoke(&command, timeout)).await)
            });
        }

        let mut results: Vec<Option<_>> = (0..permitted.len()).map(|_| None).collect();
        while let Some(joined) = calls.join_next().await {
            let (idx, result) =
                joined.map_err(|e| Error::Agent(format!("worker task panicked: {e}")))?;
            results[idx] = Some(result);
        }

        for (call, result) in permitted.iter().zip(results) {
            let exe = call.executable().to_string();
            let joined = result
                .ok_or_else(|| Error::Agent(format!("no result collected for '{exe}'")))?;
            match joined {
                Ok(RetryOutcome::Ok { value, attempts }) => {
                    let mut section = format!(
                        "{exe}: exit {} | {}",
                        value.returncode,
                        truncate(value.stdout.trim(), MAX_OUTPUT_CHARS)
                    );
                    if attempts > 1 {
                        section.push_str(&format!(" (succeeded after {attempts} attempts)"));
                    }
                    sections.push(section);
                }
                Ok(RetryOutcome::Degraded { error, attempts }) => {
                    degraded = true;
                    sections.push(format!("{exe}: failed after {attempts} attempts: {error}"));
                }
                Err(err) => {
                    if call.required {
                        return Err(Error::Agent(format!(
                            "required tool '{exe}' failed terminally: {err}"
                        )));
                    }
                    degraded = true;
                    sections.push(format!("{exe}: aborted: {err}"));
                }
            }
        }

        let mut summary = format!("[{}] {}\n{}", self.role, delegation.objective, sections.join("\n"));
        if !snippets.is_empty() {
            let titles: Vec<&str> = snippets.iter().map(|s| s.title.as_str()).collect();
            summary.push_str(&format!("\nreferences: {}", titles.join(", ")));
        }

        let finding = if degraded {
            Finding::degraded(self.role, summary)
        } else {
            Finding::success(self.role, summary)
        };

        debug!(role = %self.role, kind = finding.kind.as_str(), "worker finished");
        Ok(finding)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
