//! Transport-independent error taxonomy.
//!
//! Every layer of the inference pipeline returns one of these kinds. Each
//! transport owns exactly one translation table from [`InferError`] to its
//! own status representation; no other layer guesses at a status code.

use thiserror::Error;

/// The closed set of ways a predict call can fail.
#[derive(Debug, Error)]
pub enum InferError {
    /// Malformed request: bad dims, size mismatch, unsupported dtype, name
    /// mismatch, shape mismatch, ragged JSON input, and so on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No model record exists for the requested name.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Records exist for the name but none is marked deployed.
    #[error("model not deployed: {0}")]
    ModelNotDeployed(String),

    /// The metadata store or blob store failed to answer.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The session could not be constructed from the blob bytes.
    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    /// The runtime failed to execute an already-validated request.
    #[error("internal inference error: {0}")]
    InternalInferenceError(String),

    /// The caller went away or its deadline elapsed.
    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, InferError>;
