//! The inference orchestrator (C5): composes metadata resolution, the
//! session cache, and the tensor codec into one `predict` call, shared by
//! both transports.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::SessionCache;
use crate::error::{InferError, Result};
use crate::metadata::{resolve, MetadataStore};
use crate::session::InferenceSession;
use crate::signature::{shape_compatible, ModelSignature};
use crate::tensor::{decode_bytes, decode_json, encode_json, TensorData};

/// Stateless beyond its handles; cheap to construct per request, or shared
/// behind an `Arc` across the whole process.
pub struct Orchestrator {
    metadata: Arc<dyn MetadataStore>,
    cache: Arc<SessionCache>,
}

impl Orchestrator {
    pub fn new(metadata: Arc<dyn MetadataStore>, cache: Arc<SessionCache>) -> Self {
        Self { metadata, cache }
    }

    async fn resolve_session(&self, model_name: &str) -> Result<(Arc<dyn InferenceSession>, ModelSignature)> {
        let blob_id = resolve(self.metadata.as_ref(), model_name).await?;
        let session = self.cache.get(&blob_id).await?;
        let signature = session.signature();
        Ok((session, signature))
    }

    /// Validate a caller-supplied input name / dtype tag against the
    /// model's declared signature. `declared_dtype` of `None` means
    /// "unspecified, derive from model"; `Some("string")` is always
    /// rejected, since the string element type is never supported.
    fn validate_declared(
        signature: &ModelSignature,
        provided_name: Option<&str>,
        declared_dtype: Option<&str>,
    ) -> Result<()> {
        if let Some(name) = provided_name {
            if name != signature.input_name {
                return Err(InferError::InvalidInput(format!(
                    "input name mismatch: request declared {name:?}, model expects {:?}",
                    signature.input_name
                )));
            }
        }
        if let Some(tag) = declared_dtype {
            if tag == "string" {
                return Err(InferError::InvalidInput(
                    "string tensors are not supported".into(),
                ));
            }
            let model_tag = signature
                .input_element_type
                .map(|t| t.tag())
                .unwrap_or("unsupported");
            if tag != model_tag {
                return Err(InferError::InvalidInput(format!(
                    "dtype mismatch: request declared {tag:?}, model expects {model_tag:?}"
                )));
            }
        }
        Ok(())
    }

    /// The binary-transport path: a raw little-endian byte buffer plus
    /// explicit `dims`.
    pub async fn predict_bytes(
        &self,
        model_name: &str,
        dims: &[u64],
        content: &[u8],
        provided_name: Option<&str>,
        declared_dtype: Option<&str>,
    ) -> Result<(Vec<u64>, TensorData)> {
        let (session, signature) = self.resolve_session(model_name).await?;
        let dtype = signature.input_element_type.ok_or_else(|| {
            InferError::InvalidInput("model's declared input element type is unsupported".into())
        })?;
        Self::validate_declared(&signature, provided_name, declared_dtype)?;
        if !shape_compatible(&signature.input_shape, dims) {
            return Err(InferError::InvalidInput(format!(
                "shape mismatch: request declared {dims:?}, model expects {:?}",
                signature.input_shape
            )));
        }
        let data = decode_bytes(dims, dtype, content)?;
        session.run(data, dims).await
    }

    /// The JSON-transport path: a nested list plus an optional dtype tag.
    /// Returns the decoded input dims and the output dims alongside the
    /// encoded result, so the caller can log the request's actual shapes
    /// instead of a placeholder.
    pub async fn predict_json(
        &self,
        model_name: &str,
        input: &Value,
        declared_dtype: Option<&str>,
    ) -> Result<(Vec<u64>, Vec<u64>, Value)> {
        let (session, signature) = self.resolve_session(model_name).await?;
        let dtype = signature.input_element_type.ok_or_else(|| {
            InferError::InvalidInput("model's declared input element type is unsupported".into())
        })?;
        Self::validate_declared(&signature, None, declared_dtype)?;
        let (dims, data) = decode_json(input, dtype)?;
        if !shape_compatible(&signature.input_shape, &dims) {
            return Err(InferError::InvalidInput(format!(
                "shape mismatch: request declared {dims:?}, model expects {:?}",
                signature.input_shape
            )));
        }
        let (out_dims, out_data) = session.run(data, &dims).await?;
        let results = encode_json(&out_dims, &out_data);
        Ok((dims, out_dims, results))
    }
}
