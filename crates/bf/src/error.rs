//! CLI error types.

use bf_sandbox::SandboxError;
use bf_site::BuildError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("{0}")]
    Sandbox(#[from] SandboxError),

    #[error("{0}")]
    Validation(String),
}
