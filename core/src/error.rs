//! Error types for llmperf-bench-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum BenchError {
    /// Job configuration could not be used
    #[error("configuration error: {0}")]
    Config(String),

    /// YAML parse error in the job document
    #[error("invalid job document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error (summary artifacts)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external command could not be spawned or exited unsuccessfully
    #[error("command `{program}` failed: {message}")]
    Command {
        /// Program that was invoked
        program: String,
        /// Exit status or spawn error
        message: String,
    },

    /// Durable storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Metrics backend error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Orchestration error (panics caught at the combination boundary)
    #[error("orchestration error: {0}")]
    Orchestration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// A required builder component was not supplied
    pub fn missing_config(what: &str) -> Self {
        Self::Config(format!("missing required component: {what}"))
    }

    /// Command failure for `program`
    pub fn command(program: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            message: msg.into(),
        }
    }

    /// Storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Metrics error
    pub fn metrics(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }

    /// Orchestration error
    pub fn orchestration(msg: impl Into<String>) -> Self {
        Self::Orchestration(msg.into())
    }

    /// Whether this error invalidates the whole run rather than one combination
    pub fn is_fatal(&self) -> bool {
        matches!(self, BenchError::Config(_) | BenchError::Yaml(_))
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
