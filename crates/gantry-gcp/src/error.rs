//! Provider and stack error types.

use thiserror::Error;

/// Errors surfaced at the provider boundary. No local recovery happens for
/// any of these; they abort the apply and leave already-created resources
/// intact for a later retry.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("quota exceeded for {0}")]
    QuotaExceeded(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid image reference: {0}")]
    InvalidImage(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("build context error: {0}")]
    BuildContext(#[from] std::io::Error),

    #[error("command failed: {0}")]
    Command(String),

    #[error("provider error: {0}")]
    Api(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from declaring or running the whole stack.
#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    Config(#[from] gantry_core::ConfigError),

    #[error(transparent)]
    Graph(#[from] gantry_graph::GraphError),
}
