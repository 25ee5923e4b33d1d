//! HTTP client for the execution gateway
//!
//! Every worker reaches external tools through this client. It serializes
//! the request for `POST /exec`, surfaces the gateway's error taxonomy as
//! distinct error variants, and emits advisory progress notifications
//! around the network call.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::gateway::ExecOutput;
use crate::{Error, Result};

/// A command to send to the gateway: raw line or argument list
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExecCommand {
    Line(String),
    Argv(Vec<String>),
}

impl ExecCommand {
    /// Display form for logs and progress events
    pub fn display(&self) -> String {
        match self {
            ExecCommand::Line(line) => line.clone(),
            ExecCommand::Argv(argv) => argv.join(" "),
        }
    }

    /// The executable token, if present
    pub fn executable(&self) -> Option<&str> {
        match self {
            ExecCommand::Line(line) => line.split_whitespace().next(),
            ExecCommand::Argv(argv) => argv.first().map(String::as_str),
        }
    }
}

impl From<&str> for ExecCommand {
    fn from(line: &str) -> Self {
        ExecCommand::Line(line.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ExecRequestBody<'a> {
    cmd: &'a ExecCommand,
    timeout: u64,
}

/// Advisory sink for invocation progress events.
///
/// Implementations must be cheap and infallible; notifications may be
/// dropped but must never block or fail an invocation.
pub trait ProgressSink: Send + Sync {
    fn command_started(&self, command: &str);
    fn command_finished(&self, command: &str, success: bool);
}

/// Default sink that forwards progress to `tracing`
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn command_started(&self, command: &str) {
        info!(command, "running command");
    }

    fn command_finished(&self, command: &str, success: bool) {
        info!(command, success, "command finished");
    }
}

/// Thin caller that reaches the execution gateway over the network
#[derive(Clone)]
pub struct ToolClient {
    http: reqwest::Client,
    base_url: String,
    sink: Arc<dyn ProgressSink>,
}

impl ToolClient {
    /// Create a client for the gateway at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the progress sink
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Gateway base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a command through the gateway.
    ///
    /// The gateway's declared error categories come back as distinct
    /// variants: 400 `InvalidRequest`, 404 `ToolNotFound`, 408 `TimedOut`,
    /// anything else non-200 `Gateway`.
    pub async fn invoke(&self, command: &ExecCommand, timeout_secs: u64) -> Result<ExecOutput> {
        let display = command.display();
        self.sink.command_started(&display);

        let body = ExecRequestBody {
            cmd: command,
            timeout: timeout_secs,
        };
        let response = self
            .http
            .post(format!("{}/exec", self.base_url))
            .json(&body)
            .send()
            .await;

        let result = match response {
            Ok(resp) => Self::map_response(resp, command, timeout_secs).await,
            Err(err) => Err(Error::Http(err)),
        };

        self.sink.command_finished(&display, result.is_ok());
        result
    }

    /// Check gateway liveness via `GET /health`
    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    async fn map_response(
        resp: reqwest::Response,
        command: &ExecCommand,
        timeout_secs: u64,
    ) -> Result<ExecOutput> {
        let status = resp.status();
        if status.is_success() {
            let output: ExecOutput = resp.json().await?;
            debug!(returncode = output.returncode, "gateway returned output");
            return Ok(output);
        }

        let detail = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or_else(|| format!("gateway responded with status {status}"));

        match status.as_u16() {
            400 => Err(Error::InvalidRequest(detail)),
            404 => Err(Error::ToolNotFound(
                command.executable().unwrap_or(&detail).to_string(),
            )),
            408 => Err(Error::TimedOut(timeout_secs)),
            _ => Err(Error::Gateway(detail)),
        }
    }
}
