//! ONNX Runtime-backed implementations of [`SessionLoader`] and
//! [`InferenceSession`], gated behind the `ort-runtime` feature so the rest
//! of the crate (and its property tests) build without a linked runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Value, ValueType};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{InferError, Result};
use crate::session::{InferenceSession, SessionLoader};
use crate::signature::{Dim, ElementType, ModelSignature};
use crate::tensor::TensorData;

/// Runtime tuning applied uniformly to every session the loader builds.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub intra_threads: usize,
    pub inter_threads: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            intra_threads: 0,
            inter_threads: 0,
        }
    }
}

fn element_type_from_ort(ty: TensorElementType) -> Option<ElementType> {
    match ty {
        TensorElementType::Float32 => Some(ElementType::F32),
        TensorElementType::Float64 => Some(ElementType::F64),
        TensorElementType::Int32 => Some(ElementType::I32),
        TensorElementType::Int64 => Some(ElementType::I64),
        TensorElementType::Bool => Some(ElementType::Bool),
        _ => None,
    }
}

fn signature_from_session(session: &Session) -> ModelSignature {
    let input = &session.inputs[0];
    let output = &session.outputs[0];

    let (input_element_type, input_shape) = match &input.input_type {
        ValueType::Tensor { ty, shape, .. } => (
            element_type_from_ort(*ty),
            shape
                .iter()
                .map(|&d| if d < 0 { Dim::Any } else { Dim::Fixed(d as u64) })
                .collect(),
        ),
        _ => (None, Vec::new()),
    };

    ModelSignature {
        input_name: input.name.clone(),
        input_element_type,
        input_shape,
        output_name: output.name.clone(),
    }
}

/// Wraps a loaded ONNX Runtime session. `Session::run` requires exclusive
/// access, so calls are serialized behind an async mutex; this has no
/// bearing on the cache's own single-flight/TTL/LRU locking.
pub struct OrtSession {
    session: AsyncMutex<Session>,
    signature: ModelSignature,
}

#[async_trait]
impl InferenceSession for OrtSession {
    fn signature(&self) -> ModelSignature {
        self.signature.clone()
    }

    async fn run(&self, input: TensorData, dims: &[u64]) -> Result<(Vec<u64>, TensorData)> {
        let shape: Vec<i64> = dims.iter().map(|&d| d as i64).collect();
        let input_value = tensor_data_to_value(input, &shape)?;

        let mut feeds: HashMap<String, Value> = HashMap::new();
        feeds.insert(self.signature.input_name.clone(), input_value);

        let mut session = self.session.lock().await;
        let outputs = session
            .run(feeds)
            .map_err(|e| InferError::InternalInferenceError(e.to_string()))?;
        let output = outputs.get(self.signature.output_name.as_str()).ok_or_else(|| {
            InferError::InternalInferenceError(format!(
                "model did not produce declared output {:?}",
                self.signature.output_name
            ))
        })?;

        value_to_tensor_data(output)
    }
}

fn tensor_data_to_value(data: TensorData, shape: &[i64]) -> Result<Value> {
    let value = match data {
        TensorData::F32(v) => ort::value::Tensor::from_array((shape.to_vec(), v))
            .map_err(|e| InferError::InternalInferenceError(e.to_string()))?
            .into_dyn(),
        TensorData::F64(v) => ort::value::Tensor::from_array((shape.to_vec(), v))
            .map_err(|e| InferError::InternalInferenceError(e.to_string()))?
            .into_dyn(),
        TensorData::I32(v) => ort::value::Tensor::from_array((shape.to_vec(), v))
            .map_err(|e| InferError::InternalInferenceError(e.to_string()))?
            .into_dyn(),
        TensorData::I64(v) => ort::value::Tensor::from_array((shape.to_vec(), v))
            .map_err(|e| InferError::InternalInferenceError(e.to_string()))?
            .into_dyn(),
        TensorData::Bool(v) => ort::value::Tensor::from_array((shape.to_vec(), v))
            .map_err(|e| InferError::InternalInferenceError(e.to_string()))?
            .into_dyn(),
    };
    Ok(value)
}

fn value_to_tensor_data(value: &Value) -> Result<(Vec<u64>, TensorData)> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        return Ok((to_u64_shape(shape), TensorData::F32(data.to_vec())));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<f64>() {
        return Ok((to_u64_shape(shape), TensorData::F64(data.to_vec())));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<i32>() {
        return Ok((to_u64_shape(shape), TensorData::I32(data.to_vec())));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
        return Ok((to_u64_shape(shape), TensorData::I64(data.to_vec())));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<bool>() {
        return Ok((to_u64_shape(shape), TensorData::Bool(data.to_vec())));
    }
    Err(InferError::InternalInferenceError(
        "model output element type is not one of the supported dtypes".into(),
    ))
}

fn to_u64_shape(shape: &[i64]) -> Vec<u64> {
    shape.iter().map(|&d| d as u64).collect()
}

/// Constructs [`OrtSession`]s from raw model bytes using a shared set of
/// runtime options.
pub struct OrtSessionLoader {
    options: RuntimeOptions,
}

impl OrtSessionLoader {
    pub fn new(options: RuntimeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionLoader for OrtSessionLoader {
    async fn load(&self, model_bytes: Vec<u8>) -> Result<Arc<dyn InferenceSession>> {
        let options = self.options;
        let session = tokio::task::spawn_blocking(move || -> ort::Result<Session> {
            let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
            if options.intra_threads > 0 {
                builder = builder.with_intra_threads(options.intra_threads)?;
            }
            if options.inter_threads > 0 {
                builder = builder.with_inter_threads(options.inter_threads)?;
            }
            builder.commit_from_memory(&model_bytes)
        })
        .await
        .map_err(|e| InferError::ModelLoadFailed(e.to_string()))?
        .map_err(|e| InferError::ModelLoadFailed(e.to_string()))?;

        let signature = signature_from_session(&session);
        Ok(Arc::new(OrtSession {
            session: AsyncMutex::new(session),
            signature,
        }))
    }
}
