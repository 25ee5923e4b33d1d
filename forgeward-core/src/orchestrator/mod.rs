//! Orchestrator control loop
//!
//! Drives one conversation thread through bounded dispatch rounds:
//! select workers for the objective, fan delegations out, collect
//! findings in dispatch order, synthesize a response, and checkpoint the
//! thread. A single worker's terminal failure becomes a failure-marked
//! finding, never a crashed session.

pub mod selector;

pub use selector::{AgentSelector, KeywordSelector};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agents::{AgentRole, SubAgent, TaskDelegation};
use crate::state::{ConversationThread, Finding, ThreadStore};
use crate::{Error, Result};

/// Default bound on dispatch rounds per objective
pub const DEFAULT_MAX_ROUNDS: u32 = 4;

/// Control-loop state over a single thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingObjective,
    Dispatching,
    CollectingResults,
    Synthesizing,
    SessionEnded,
}

/// Result of one completed turn
#[derive(Debug)]
pub struct TurnOutcome {
    pub thread_id: String,
    pub response: String,
    pub findings: Vec<Finding>,
    pub rounds: u32,
}

enum Dispatched {
    Running(AgentRole, JoinHandle<Result<Finding>>),
    Immediate(Finding),
}

/// Coordinates sub-agent workers over a conversation thread
pub struct Orchestrator {
    store: Arc<dyn ThreadStore>,
    selector: Arc<dyn AgentSelector>,
    workers: HashMap<AgentRole, Arc<SubAgent>>,
    max_rounds: u32,
    deadline: Option<Duration>,
    phase: TurnPhase,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ThreadStore>, selector: Arc<dyn AgentSelector>) -> Self {
        Self {
            store,
            selector,
            workers: HashMap::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            deadline: None,
            phase: TurnPhase::AwaitingObjective,
        }
    }

    /// Register the worker handling `role`
    pub fn with_worker(mut self, worker: Arc<SubAgent>) -> Self {
        self.workers.insert(worker.role(), worker);
        self
    }

    /// Bound the number of dispatch rounds per objective
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Enforce a wall-clock deadline per objective; expiry cancels any
    /// still-running worker tasks
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Current control-loop phase
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Explicitly terminate the session
    pub fn end_session(&mut self) {
        self.set_phase(TurnPhase::SessionEnded);
    }

    fn set_phase(&mut self, phase: TurnPhase) {
        debug!(?phase, "control loop phase");
        self.phase = phase;
    }

    /// Process one user objective end-to-end.
    ///
    /// Loads the thread (creating it on first use), runs bounded dispatch
    /// rounds, merges findings in dispatch order, synthesizes a response
    /// that reflects degraded and failed findings, persists the thread,
    /// and returns to awaiting the next objective.
    pub async fn handle_objective(
        &mut self,
        thread_id: &str,
        objective: &str,
    ) -> Result<TurnOutcome> {
        if self.phase == TurnPhase::SessionEnded {
            return Err(Error::Agent("session has ended".to_string()));
        }

        let mut thread = self
            .store
            .load(thread_id)?
            .unwrap_or_else(|| ConversationThread::new(thread_id));
        thread.push_user(objective);

        let started = Instant::now();
        let mut turn_findings: Vec<Finding> = Vec::new();
        let mut rounds = 0u32;

        while rounds < self.max_rounds {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    warn!(round = rounds, "objective deadline expired, ending dispatch");
                    break;
                }
            }

            let roles = self.selector.select(objective, &thread, rounds);
            if roles.is_empty() {
                break;
            }

            self.set_phase(TurnPhase::Dispatching);
            info!(round = rounds, ?roles, "dispatching sub-agents");

            let mut dispatched = Vec::with_capacity(roles.len());
            for role in roles {
                match self.workers.get(&role) {
                    Some(worker) => {
                        let worker = Arc::clone(worker);
                        let delegation = TaskDelegation::new(role, objective);
                        dispatched.push(Dispatched::Running(
                            role,
                            tokio::spawn(async move { worker.run(&delegation).await }),
                        ));
                    }
                    None => {
                        warn!(role = %role, "no worker configured");
                        dispatched.push(Dispatched::Immediate(Finding::failed(
                            role,
                            format!("no worker configured for role '{role}'"),
                        )));
                    }
                }
            }

            self.set_phase(TurnPhase::CollectingResults);
            for entry in dispatched {
                let finding = match entry {
                    Dispatched::Immediate(finding) => finding,
                    Dispatched::Running(role, handle) => {
                        self.collect_one(role, handle, started).await
                    }
                };
                thread.add_finding(finding.clone());
                turn_findings.push(finding);
            }

            rounds += 1;
        }

        if rounds == self.max_rounds
            && !self.selector.select(objective, &thread, rounds).is_empty()
        {
            warn!(
                max_rounds = self.max_rounds,
                "dispatch round bound reached, ending turn"
            );
        }

        self.set_phase(TurnPhase::Synthesizing);
        let response = synthesize(objective, &turn_findings, rounds);
        thread.push_assistant(&response);
        self.store.save(&thread)?;

        self.set_phase(TurnPhase::AwaitingObjective);
        Ok(TurnOutcome {
            thread_id: thread_id.to_string(),
            response,
            findings: turn_findings,
            rounds,
        })
    }

    /// Await one worker, honoring the per-objective deadline.
    ///
    /// A worker's terminal failure is recorded as a failure-marked
    /// finding; collection continues for the remaining workers.
    async fn collect_one(
        &self,
        role: AgentRole,
        mut handle: JoinHandle<Result<Finding>>,
        started: Instant,
    ) -> Finding {
        let joined = match self.deadline {
            None => handle.await,
            Some(deadline) => {
                let remaining = deadline.saturating_sub(started.elapsed());
                match tokio::time::timeout(remaining, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_elapsed) => {
                        // Abort propagates cancellation: the in-flight
                        // gateway call is dropped and its child killed
                        handle.abort();
                        warn!(role = %role, "objective deadline expired, cancelling worker");
                        return Finding::failed(role, "objective deadline exceeded");
                    }
                }
            }
        };

        match joined {
            Ok(Ok(finding)) => finding,
            Ok(Err(err)) => {
                warn!(role = %role, error = %err, "worker failed terminally");
                Finding::failed(role, err.to_string())
            }
            Err(join_err) => {
                warn!(role = %role, error = %join_err, "worker task aborted");
                Finding::failed(role, format!("worker task aborted: {join_err}"))
            }
        }
    }
}

/// Fold the turn's findings into a user-facing response.
///
/// Degraded and failed findings are named, never silently omitted.
fn synthesize(objective: &str, findings: &[Finding], rounds: u32) -> String {
    if findings.is_empty() {
        return format!("Objective: {objective}\nNo sub-agents were dispatched.");
    }

    let mut lines = vec![format!(
        "Objective: {objective}\n{} finding(s) collected over {rounds} dispatch round(s):",
        findings.len()
    )];
    for finding in findings {
        let flat = finding.summary.replace('\n', " | ");
        lines.push(format!(
            "- {} [{}]: {}",
            finding.source_agent,
            finding.kind.as_str(),
            flat
        ));
    }
    lines.join("\n")
}
