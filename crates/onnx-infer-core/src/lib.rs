//! Session cache and inference orchestrator for deployed ONNX models.
//!
//! This crate is transport-agnostic: it knows nothing of JSON or gRPC, only
//! of model names, blob ids, tensors, and the [`InferError`] taxonomy each
//! transport translates at its own boundary.

pub mod blob;
pub mod cache;
pub mod error;
pub mod metadata;
#[cfg(feature = "ort-runtime")]
pub mod ort_session;
pub mod orchestrator;
pub mod session;
pub mod signature;
pub mod tensor;

pub use blob::BlobStore;
pub use cache::{CacheConfig, SessionCache};
pub use error::{InferError, Result};
pub use metadata::{MetadataStore, ModelRecord, ModelStatus};
pub use orchestrator::Orchestrator;
pub use session::{InferenceSession, SessionLoader};
pub use signature::{Dim, ElementType, ModelSignature};
pub use tensor::TensorData;

#[cfg(feature = "ort-runtime")]
pub use ort_session::{OrtSession, OrtSessionLoader, RuntimeOptions};
