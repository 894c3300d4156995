//! Graph and engine error types.

use thiserror::Error;

/// Errors surfaced by graph declaration and execution.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate resource name: {0}")]
    DuplicateName(String),

    #[error("output never resolved (its producing resource failed or was skipped)")]
    Unresolved,

    #[error("resource {name} failed: {source}")]
    ResourceFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("apply aborted: {failed} resource(s) failed, {skipped} skipped")]
    ApplyFailed { failed: usize, skipped: usize },

    #[error("destroy incomplete: {failed} resource(s) failed to delete")]
    DestroyFailed { failed: usize },
}

pub type GraphResult<T> = Result<T, GraphError>;
