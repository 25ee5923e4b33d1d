//! Sandboxed command-execution gateway

pub mod exec;
pub mod server;

pub use exec::{execute, execute_line, tokenize, ExecOutcome, ExecOutput, DEFAULT_TIMEOUT_SECS};
pub use server::{CmdInput, ExecGateway};
