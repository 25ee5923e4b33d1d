//! Tool invocation plumbing shared by all workers

pub mod client;

pub use client::{ExecCommand, ProgressSink, ToolClient, TracingSink};
