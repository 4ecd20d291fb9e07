//! The two capabilities the session cache is built around: constructing a
//! session from model bytes, and executing one already-loaded session.
//!
//! Both are traits rather than concrete `ort` types so the cache's
//! concurrency properties (single-flight, LRU, TTL) can be property-tested
//! against in-memory fakes, without linking a real ONNX Runtime or shipping
//! a model artifact alongside the tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::signature::ModelSignature;
use crate::tensor::TensorData;

/// A loaded, runnable model. Implementations that wrap a runtime handle
/// requiring exclusive access per call (as `ort::Session::run` does) must
/// serialize calls internally with their own execution mutex; this does not
/// affect the cache's own locking.
#[async_trait]
pub trait InferenceSession: Send + Sync {
    /// The input/output signature, recomputed cheaply from runtime metadata.
    fn signature(&self) -> ModelSignature;

    /// Execute the model against one input tensor, returning output[0].
    async fn run(&self, input: TensorData, input_dims: &[u64]) -> Result<(Vec<u64>, TensorData)>;
}

/// Constructs an [`InferenceSession`] from raw model bytes. The production
/// implementation wraps ONNX Runtime session construction; tests substitute
/// a fake that counts invocations and returns a canned session.
#[async_trait]
pub trait SessionLoader: Send + Sync {
    async fn load(&self, model_bytes: Vec<u8>) -> Result<Arc<dyn InferenceSession>>;
}
