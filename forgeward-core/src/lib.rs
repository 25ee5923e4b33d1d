//! forgeward-core: sub-agent orchestration over a sandboxed execution gateway

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod agents;
pub mod config;
pub mod docs;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod retry;
pub mod state;
pub mod tools;

pub use error::{Error, Result};
