//! Integration tests for the orchestrator control loop
//!
//! These run a real execution gateway on an ephemeral port and drive the
//! loop with fixed playbooks, so the full path (selection, delegation,
//! retry, gateway, collection, synthesis, checkpoint) is exercised.

use std::sync::Arc;

use forgeward_core::agents::{AgentRole, Playbook, PlannedCall, RoleConfig, SubAgent};
use forgeward_core::docs::StaticDocIndex;
use forgeward_core::gateway::ExecGateway;
use forgeward_core::orchestrator::{AgentSelector, Orchestrator, TurnPhase};
use forgeward_core::retry::{OnExhaustion, RetryPolicy};
use forgeward_core::state::{ConversationThread, FindingKind, MemoryThreadStore, ThreadStore};
use forgeward_core::tools::ToolClient;
use tempfile::TempDir;

struct FixedPlaybook {
    calls: Vec<PlannedCall>,
}

impl Playbook for FixedPlaybook {
    fn plan(&self, _role: AgentRole, _objective: &str) -> Vec<PlannedCall> {
        self.calls.clone()
    }
}

struct SequencedSelector {
    roles: Vec<AgentRole>,
}

impl AgentSelector for SequencedSelector {
    fn select(&self, _objective: &str, _thread: &ConversationThread, round: u32) -> Vec<AgentRole> {
        if round == 0 {
            self.roles.clone()
        } else {
            Vec::new()
        }
    }
}

/// A selection function that never stops asking for more work
struct GreedySelector;

impl AgentSelector for GreedySelector {
    fn select(
        &self,
        _objective: &str,
        _thread: &ConversationThread,
        _round: u32,
    ) -> Vec<AgentRole> {
        vec![AgentRole::Recon]
    }
}

fn make_worker(
    role: AgentRole,
    gateway_url: &str,
    calls: Vec<PlannedCall>,
    retry: RetryPolicy,
    tool_timeout_secs: u64,
) -> Arc<SubAgent> {
    let allowed = vec!["echo".to_string(), "sh".to_string(), "sleep".to_string()];
    Arc::new(SubAgent::new(
        role,
        RoleConfig::new(allowed, role.as_str()),
        Arc::new(ToolClient::new(gateway_url)),
        Arc::new(StaticDocIndex::new(vec![])),
        Arc::new(FixedPlaybook { calls }),
        retry,
        tool_timeout_secs,
    ))
}

#[tokio::test]
async fn test_partial_failure_keeps_turn_alive() {
    let gateway = ExecGateway::start("127.0.0.1", 0).await.expect("gateway");
    let store = Arc::new(MemoryThreadStore::new());

    // Recon succeeds; Exploit's only (required) tool does not exist and
    // its policy aborts on exhaustion, so the delegation fails terminally.
    let recon = make_worker(
        AgentRole::Recon,
        &gateway.url(),
        vec![PlannedCall::new("echo open-port-80")],
        RetryPolicy::immediate(2, OnExhaustion::Continue),
        10,
    );
    let exploit = Arc::new(SubAgent::new(
        AgentRole::Exploit,
        RoleConfig::new(vec!["missing-exploit-kit".to_string()], "exploit"),
        Arc::new(ToolClient::new(gateway.url())),
        Arc::new(StaticDocIndex::new(vec![])),
        Arc::new(FixedPlaybook {
            calls: vec![PlannedCall::new("missing-exploit-kit --run").required()],
        }),
        RetryPolicy::immediate(2, OnExhaustion::Abort),
        10,
    ));

    let mut orch = Orchestrator::new(
        store.clone(),
        Arc::new(SequencedSelector {
            roles: vec![AgentRole::Recon, AgentRole::Exploit],
        }),
    )
    .with_worker(recon)
    .with_worker(exploit);

    let outcome = orch
        .handle_objective("partial-1", "recon then exploit the target")
        .await
        .expect("turn should complete despite one worker failing");

    // Exactly one success and one failure-marked finding, dispatch order
    assert_eq!(outcome.findings.len(), 2);
    assert_eq!(outcome.findings[0].source_agent, AgentRole::Recon);
    assert_eq!(outcome.findings[0].kind, FindingKind::Success);
    assert_eq!(outcome.findings[1].source_agent, AgentRole::Exploit);
    assert_eq!(outcome.findings[1].kind, FindingKind::Failed);

    // Loop returned to awaiting rather than halting
    assert_eq!(orch.phase(), TurnPhase::AwaitingObjective);

    // Synthesis reflects the failure instead of omitting it
    assert!(outcome.response.contains("exploit [failed]"));
    assert!(outcome.response.contains("open-port-80"));

    let thread = store.load("partial-1").expect("load").expect("thread");
    assert_eq!(thread.findings.len(), 2);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_round_bound_terminates_greedy_selector() {
    let gateway = ExecGateway::start("127.0.0.1", 0).await.expect("gateway");
    let store = Arc::new(MemoryThreadStore::new());

    let recon = make_worker(
        AgentRole::Recon,
        &gateway.url(),
        vec![PlannedCall::new("echo round-output")],
        RetryPolicy::immediate(1, OnExhaustion::Continue),
        10,
    );

    let mut orch = Orchestrator::new(store, Arc::new(GreedySelector))
        .with_worker(recon)
        .with_max_rounds(3);

    let outcome = orch
        .handle_objective("greedy-1", "keep going forever")
        .await
        .expect("turn must terminate at the round bound");

    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.findings.len(), 3);
    assert_eq!(orch.phase(), TurnPhase::AwaitingObjective);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_recon_then_scan_with_flaky_tool() {
    let gateway = ExecGateway::start("127.0.0.1", 0).await.expect("gateway");
    let store = Arc::new(MemoryThreadStore::new());

    // Scan tool sleeps past the timeout on its first two runs, then
    // answers promptly; a counter file carries state between attempts.
    let tmp = TempDir::new().expect("tempdir");
    let counter = tmp.path().join("attempts");
    let script = format!(
        "sh -c \"n=$(cat {c} 2>/dev/null||echo 0);n=$((n+1));echo $n>{c};[ $n -lt 3 ]&&sleep 5;echo scan-complete\"",
        c = counter.display()
    );

    let recon = make_worker(
        AgentRole::Recon,
        &gateway.url(),
        vec![PlannedCall::new("echo F1-subdomain-found")],
        RetryPolicy::immediate(3, OnExhaustion::Continue),
        10,
    );
    let scan = make_worker(
        AgentRole::ScanEnum,
        &gateway.url(),
        vec![PlannedCall::new(script)],
        RetryPolicy::immediate(3, OnExhaustion::Continue),
        1,
    );

    let mut orch = Orchestrator::new(
        store,
        Arc::new(SequencedSelector {
            roles: vec![AgentRole::Recon, AgentRole::ScanEnum],
        }),
    )
    .with_worker(recon)
    .with_worker(scan);

    let outcome = orch
        .handle_objective("flaky-1", "recon then scan the target")
        .await
        .expect("session proceeds through transient timeouts");

    assert_eq!(outcome.findings.len(), 2);
    assert_eq!(outcome.findings[0].source_agent, AgentRole::Recon);
    assert_eq!(outcome.findings[1].source_agent, AgentRole::ScanEnum);
    assert_eq!(outcome.findings[1].kind, FindingKind::Success);

    // Both findings are referenced by the synthesized response, and the
    // delayed call records exactly three attempts
    assert!(outcome.response.contains("F1-subdomain-found"));
    assert!(outcome.response.contains("scan-complete"));
    assert!(outcome.response.contains("succeeded after 3 attempts"));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_objective_deadline_cancels_slow_worker() {
    let gateway = ExecGateway::start("127.0.0.1", 0).await.expect("gateway");
    let store = Arc::new(MemoryThreadStore::new());

    let slow = make_worker(
        AgentRole::ScanEnum,
        &gateway.url(),
        vec![PlannedCall::new("sleep 31234")],
        RetryPolicy::immediate(1, OnExhaustion::Continue),
        60,
    );

    let mut orch = Orchestrator::new(
        store,
        Arc::new(SequencedSelector {
            roles: vec![AgentRole::ScanEnum],
        }),
    )
    .with_worker(slow)
    .with_deadline(std::time::Duration::from_secs(1));

    let started = std::time::Instant::now();
    let outcome = orch
        .handle_objective("deadline-1", "scan slowly")
        .await
        .expect("deadline expiry still yields a turn");

    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].kind, FindingKind::Failed);
    assert!(outcome.findings[0].summary.contains("deadline"));

    // Cancellation reached the gateway: the spawned child is gone, not
    // detached and still sleeping
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    let pgrep = std::process::Command::new("pgrep")
        .args(["-f", "sleep 31234"])
        .output()
        .expect("pgrep");
    assert!(
        !pgrep.status.success(),
        "child process survived cancellation"
    );

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_expired_deadline_stops_further_rounds() {
    let gateway = ExecGateway::start("127.0.0.1", 0).await.expect("gateway");
    let store = Arc::new(MemoryThreadStore::new());

    let slow = make_worker(
        AgentRole::Recon,
        &gateway.url(),
        vec![PlannedCall::new("sleep 31236")],
        RetryPolicy::immediate(1, OnExhaustion::Continue),
        60,
    );

    let mut orch = Orchestrator::new(store, Arc::new(GreedySelector))
        .with_worker(slow)
        .with_max_rounds(3)
        .with_deadline(std::time::Duration::from_secs(1));

    let outcome = orch
        .handle_objective("deadline-2", "keep scanning")
        .await
        .expect("turn ends at the deadline");

    // Expiry ends dispatch after the first round instead of burning the
    // remaining rounds on instantly-cancelled workers
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].kind, FindingKind::Failed);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_multi_turn_session_accumulates_findings() {
    let gateway = ExecGateway::start("127.0.0.1", 0).await.expect("gateway");
    let store = Arc::new(MemoryThreadStore::new());

    let recon = make_worker(
        AgentRole::Recon,
        &gateway.url(),
        vec![PlannedCall::new("echo turn-output")],
        RetryPolicy::immediate(1, OnExhaustion::Continue),
        10,
    );

    let mut orch = Orchestrator::new(
        store.clone(),
        Arc::new(SequencedSelector {
            roles: vec![AgentRole::Recon],
        }),
    )
    .with_worker(recon);

    orch.handle_objective("multi-1", "first pass")
        .await
        .expect("first turn");
    orch.handle_objective("multi-1", "second pass")
        .await
        .expect("second turn");

    let thread = store.load("multi-1").expect("load").expect("thread");
    // Two user turns, two assistant turns, findings append-only
    assert_eq!(thread.turns.len(), 4);
    assert_eq!(thread.findings.len(), 2);

    gateway.shutdown().await;
}
