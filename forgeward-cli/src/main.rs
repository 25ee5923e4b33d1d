mod args;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use forgeward_core::agents::{AgentRole, StaticPlaybook, SubAgent};
use forgeward_core::config::SessionConfig;
use forgeward_core::docs::StaticDocIndex;
use forgeward_core::gateway::ExecGateway;
use forgeward_core::orchestrator::{KeywordSelector, Orchestrator};
use forgeward_core::state::{MemoryThreadStore, SqliteThreadStore, ThreadStore};
use forgeward_core::tools::ToolClient;

use args::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::load_default(),
    };

    match args.command {
        Command::Serve { port } => serve(&config, port).await,
        Command::Run {
            objective,
            thread,
            target,
            store,
        } => run(&config, objective, thread, target, store).await,
    }
}

async fn serve(config: &SessionConfig, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.gateway.port);
    let gateway = ExecGateway::start(&config.gateway.host, port).await?;
    println!("execution gateway listening on {}", gateway.url());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    gateway.shutdown().await;
    Ok(())
}

async fn run(
    config: &SessionConfig,
    objective: String,
    thread: Option<String>,
    target: Option<String>,
    store_path: Option<std::path::PathBuf>,
) -> Result<()> {
    let target = target.unwrap_or_else(|| config.target.clone());
    if target.is_empty() {
        anyhow::bail!("no target configured; pass --target or set it in the config file");
    }

    let store: Arc<dyn ThreadStore> = match store_path {
        Some(path) => Arc::new(SqliteThreadStore::open(path)?),
        None => Arc::new(MemoryThreadStore::new()),
    };

    let client = Arc::new(ToolClient::new(config.gateway.base_url()));
    let docs = StaticDocIndex::new(config.docs.clone());
    let playbook = Arc::new(StaticPlaybook::new(target.as_str()));
    let retry = config.retry.to_policy();
    let timeout = config.gateway.default_timeout_secs;

    let mut orchestrator = Orchestrator::new(store, Arc::new(KeywordSelector))
        .with_max_rounds(config.orchestrator.max_dispatch_rounds);
    if let Some(secs) = config.orchestrator.objective_deadline_secs {
        orchestrator = orchestrator.with_deadline(std::time::Duration::from_secs(secs));
    }
    for role in AgentRole::ALL {
        let role_config = config.role_config(role);
        let scoped_docs = Arc::new(docs.scoped(&role_config.docs_scope));
        orchestrator = orchestrator.with_worker(Arc::new(SubAgent::new(
            role,
            role_config,
            Arc::clone(&client),
            scoped_docs,
            playbook.clone(),
            retry.clone(),
            timeout,
        )));
    }

    let thread_id = thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let outcome = orchestrator.handle_objective(&thread_id, &objective).await?;

    println!("thread: {}", outcome.thread_id);
    println!("{}", outcome.response);
    Ok(())
}
