//! Error types for the suite runner

use thiserror::Error;

/// Startup failures that abort a run before any unit executes
#[derive(Error, Debug)]
pub enum FatalStartupError {
    #[error("automation server at {host}:{port} did not respond within {timeout_secs}s")]
    ReadinessTimeout {
        host: String,
        port: u16,
        timeout_secs: u32,
    },

    #[error("failed to start {what}: {reason}")]
    Spawn { what: String, reason: String },
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fatal startup error: {0}")]
    FatalStartup(#[from] FatalStartupError),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunnerError {
    /// True for errors raised while bringing the auxiliary servers up
    pub fn is_fatal_startup(&self) -> bool {
        matches!(self, RunnerError::FatalStartup(_))
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;
