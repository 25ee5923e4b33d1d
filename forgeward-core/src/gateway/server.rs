//! Network endpoint for the execution gateway
//!
//! Exposes `POST /exec` and `GET /health` over HTTP. Request bodies carry
//! either a free-form command string or an argument list plus an optional
//! timeout; responses mirror the command's captured output or a status
//! code from the gateway's error taxonomy.

use std::net::SocketAddr;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::gateway::exec::{self, ExecOutcome, DEFAULT_TIMEOUT_SECS};
use crate::Result;

/// Command input: a raw line to tokenize, or a ready argument list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CmdInput {
    Line(String),
    Argv(Vec<String>),
}

/// Body of `POST /exec`
#[derive(Debug, Deserialize)]
struct ExecBody {
    cmd: CmdInput,
    timeout: Option<u64>,
}

/// HTTP server wrapping the process executor.
///
/// Binds to the requested address (port 0 for OS-assigned) and spawns a
/// background accept loop. Use [`url()`](Self::url) for the base address.
/// The server keeps no state across requests; every `/exec` call is an
/// independent child process.
pub struct ExecGateway {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: JoinHandle<()>,
}

impl ExecGateway {
    /// Start the gateway on `host:port`.
    pub async fn start(host: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;

        debug!("execution gateway listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown_rx).await;
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        })
    }

    /// The full base URL of the running gateway (e.g. `http://127.0.0.1:9756`).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The port the gateway is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Gracefully shut down the gateway.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Accept loop that runs until shutdown is signalled.
    async fn accept_loop(listener: TcpListener, mut shutdown_rx: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!("gateway connection from {}", peer);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(handle_request);
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    error!("gateway connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("gateway accept error: {}", e);
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("execution gateway shutting down");
                    break;
                }
            }
        }
    }
}

/// Build a JSON response with the given status code and body.
fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .unwrap_or_else(|_| {
            warn!("failed to build HTTP response, returning empty 500");
            let mut resp = Response::new(Full::new(Bytes::new()));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        })
}

fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "detail": detail.into() }))
}

/// Route a single HTTP request.
async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({ "status": "healthy", "service": "exec-gateway" }),
        )),
        (&Method::POST, "/exec") => handle_exec(req).await,
        _ => Ok(detail_response(StatusCode::NOT_FOUND, "unknown route")),
    }
}

/// Handle `POST /exec`: validate, tokenize if needed, run, map the outcome.
async fn handle_exec(
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let body = req.collect().await?.to_bytes();

    let parsed: ExecBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!("rejecting malformed exec request: {}", e);
            return Ok(detail_response(
                StatusCode::BAD_REQUEST,
                format!("'cmd' must be a string or a list of strings: {e}"),
            ));
        }
    };

    let timeout_secs = parsed.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Ok(detail_response(
            StatusCode::BAD_REQUEST,
            "'timeout' must be a positive number of seconds",
        ));
    }

    let argv = match parsed.cmd {
        CmdInput::Argv(argv) => argv,
        CmdInput::Line(line) => match exec::tokenize(&line) {
            Ok(argv) => argv,
            Err(e) => {
                return Ok(detail_response(StatusCode::BAD_REQUEST, e.to_string()));
            }
        },
    };

    debug!(command = ?argv, timeout_secs, "executing command");

    let outcome = match exec::execute(&argv, timeout_secs).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Validation failure (empty argv), not an execution failure
            return Ok(detail_response(StatusCode::BAD_REQUEST, e.to_string()));
        }
    };

    let response = match outcome {
        ExecOutcome::Completed(out) => json_response(
            StatusCode::OK,
            &serde_json::json!({
                "stdout": out.stdout,
                "stderr": out.stderr,
                "returncode": out.returncode,
            }),
        ),
        ExecOutcome::TimedOut { timeout_secs } => detail_response(
            StatusCode::REQUEST_TIMEOUT,
            format!("Command execution timed out after {timeout_secs} seconds"),
        ),
        ExecOutcome::NotFound { executable } => detail_response(
            StatusCode::NOT_FOUND,
            format!("Command not found: '{executable}'"),
        ),
        ExecOutcome::Failed { message } => detail_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error executing command: {message}"),
        ),
    };

    Ok(response)
}
