//! Typed error taxonomy for the inference pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PythinferError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse {path} as {format}: {detail}")]
    Parse {
        path: String,
        format: String,
        detail: String,
    },

    #[error("permission denied: graph <{graph}> is not in this view's whitelist")]
    PermissionFailure { graph: String },

    #[error("read-only view: mutation attempted on graph <{graph}>")]
    ReadOnlyFailure { graph: String },

    #[error("backend reasoner `{backend}` failed: {detail}")]
    Backend { backend: String, detail: String },

    #[error(
        "fixed-point did not converge within {bound} rounds (round {bound} still added {last_round_delta} triples)"
    )]
    BoundExceeded {
        bound: usize,
        last_round_delta: usize,
    },

    #[error("pipeline run was cancelled")]
    Cancelled,
}
