//! Centralized CLI error handling.

use taskmesh::config::ConfigError;
use thiserror::Error;

/// User-facing CLI failures.
///
/// Each variant renders as a short actionable message; exit codes are
/// derived in `main`.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file problems.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging initialization failed.
    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] std::io::Error),

    /// The transport server could not start.
    #[error("Server error: {0}")]
    Server(String),

    /// Signal handler installation failed.
    #[error("Failed to install signal handler: {0}")]
    Signal(String),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Server(_) => 3,
            CliError::Logging(_) | CliError::Signal(_) => 1,
        }
    }
}
