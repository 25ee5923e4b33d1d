//! Error types for forgeward-core

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using forgeward Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for forgeward
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(forgeward::config))]
    Config(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(forgeward::database))]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(forgeward::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(forgeward::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(forgeward::toml))]
    Toml(#[from] toml::de::Error),

    #[error("HTTP transport error: {0}")]
    #[diagnostic(code(forgeward::http))]
    Http(#[from] reqwest::Error),

    #[error("Invalid execution request: {0}")]
    #[diagnostic(code(forgeward::invalid_request))]
    InvalidRequest(String),

    #[error("Executable not found: {0}")]
    #[diagnostic(code(forgeward::tool_not_found))]
    ToolNotFound(String),

    #[error("Command timed out after {0} seconds")]
    #[diagnostic(code(forgeward::timed_out))]
    TimedOut(u64),

    #[error("Execution gateway error: {0}")]
    #[diagnostic(code(forgeward::gateway))]
    Gateway(String),

    #[error("Agent error: {0}")]
    #[diagnostic(code(forgeward::agent))]
    Agent(String),

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    #[diagnostic(code(forgeward::retry_exhausted))]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether a failure is worth retrying.
    ///
    /// Malformed requests and missing executables are permanent; timeouts
    /// and gateway/transport failures may be transient load conditions.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::TimedOut(_) | Error::Gateway(_) | Error::Http(_) => true,
            Error::InvalidRequest(_) | Error::ToolNotFound(_) => false,
            _ => false,
        }
    }
}
