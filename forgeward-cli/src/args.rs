//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "forgeward")]
#[command(author, version, about = "Sub-agent security assessment orchestrator")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the execution gateway service
    Serve {
        /// Port override (defaults to the configured gateway port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Execute one objective against a conversation thread
    Run {
        /// Objective to hand to the orchestrator
        #[arg(long)]
        objective: String,

        /// Thread to resume (a new one is created when omitted)
        #[arg(long)]
        thread: Option<String>,

        /// Engagement target host or domain
        #[arg(long)]
        target: Option<String>,

        /// Sqlite checkpoint database (in-memory store when omitted)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}
