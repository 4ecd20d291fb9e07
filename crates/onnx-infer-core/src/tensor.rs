//! The tensor codec (C4): decode a request tensor from either wire format,
//! encode a response tensor back to it.

use serde_json::Value;

use crate::error::{InferError, Result};
use crate::signature::ElementType;

/// A decoded tensor's payload, still tagged by element type. Kept as plain
/// `Vec<T>` rather than an `ndarray` array at the codec boundary; the
/// orchestrator reshapes into an `ndarray` view when it hands the tensor to
/// the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl TensorData {
    pub fn dtype(&self) -> ElementType {
        match self {
            TensorData::F32(_) => ElementType::F32,
            TensorData::F64(_) => ElementType::F64,
            TensorData::I32(_) => ElementType::I32,
            TensorData::I64(_) => ElementType::I64,
            TensorData::Bool(_) => ElementType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn elem_count(dims: &[u64]) -> usize {
    dims.iter().map(|&d| d as usize).product()
}

/// Decode raw little-endian bytes into a typed, shaped tensor (the binary
/// path). `dims` must be non-empty and `content.len()` must exactly equal
/// `prod(dims) * elem_size(dtype)`.
pub fn decode_bytes(dims: &[u64], dtype: ElementType, content: &[u8]) -> Result<TensorData> {
    if dims.is_empty() {
        return Err(InferError::InvalidInput("dims must be non-empty".into()));
    }
    let elems = elem_count(dims);
    let expected = elems * dtype.elem_size();
    if content.len() != expected {
        return Err(InferError::InvalidInput(format!(
            "tensor_content length mismatch: expected {expected} bytes for {elems} {dtype} elements, got {}",
            content.len()
        )));
    }
    let data = match dtype {
        ElementType::F32 => TensorData::F32(
            content
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        ElementType::F64 => TensorData::F64(
            content
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        ElementType::I32 => TensorData::I32(
            content
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        ElementType::I64 => TensorData::I64(
            content
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        ElementType::Bool => TensorData::Bool(content.iter().map(|&b| b != 0).collect()),
    };
    Ok(data)
}

/// Encode a typed tensor back to little-endian bytes (the binary path and
/// the internal representation the orchestrator passes around).
pub fn encode_bytes(data: &TensorData) -> Vec<u8> {
    match data {
        TensorData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::Bool(v) => v.iter().map(|&b| u8::from(b)).collect(),
    }
}

/// Infer the rectangular shape of a nested JSON array and flatten its
/// leaves in row-major order. Fails on ragged nesting.
fn flatten_leaves<'a>(value: &'a Value, dims: &mut Vec<u64>, depth: usize, leaves: &mut Vec<&'a Value>) -> Result<()> {
    match value {
        Value::Array(items) => {
            if depth == dims.len() {
                dims.push(items.len() as u64);
            } else if dims[depth] != items.len() as u64 {
                return Err(InferError::InvalidInput("ragged input array".into()));
            }
            for item in items {
                flatten_leaves(item, dims, depth + 1, leaves)?;
            }
            Ok(())
        }
        other => {
            if depth != dims.len() {
                return Err(InferError::InvalidInput("ragged input array".into()));
            }
            leaves.push(other);
            Ok(())
        }
    }
}

fn leaf_to_f64(v: &Value) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| InferError::InvalidInput(format!("expected a number, got {v}")))
}

/// Decode a nested JSON list into a typed, shaped tensor (the JSON path).
/// Every leaf is cast to `dtype`; out-of-range or non-finite values where
/// the target type is integral fail as invalid input.
pub fn decode_json(value: &Value, dtype: ElementType) -> Result<(Vec<u64>, TensorData)> {
    let mut dims = Vec::new();
    let mut leaves = Vec::new();
    flatten_leaves(value, &mut dims, 0, &mut leaves)?;
    if dims.is_empty() {
        return Err(InferError::InvalidInput("dims must be non-empty".into()));
    }
    let data = match dtype {
        ElementType::F32 => {
            let mut out = Vec::with_capacity(leaves.len());
            for v in leaves {
                out.push(leaf_to_f64(v)? as f32);
            }
            TensorData::F32(out)
        }
        ElementType::F64 => {
            let mut out = Vec::with_capacity(leaves.len());
            for v in leaves {
                out.push(leaf_to_f64(v)?);
            }
            TensorData::F64(out)
        }
        ElementType::I32 => {
            let mut out = Vec::with_capacity(leaves.len());
            for v in leaves {
                let n = v
                    .as_i64()
                    .ok_or_else(|| InferError::InvalidInput(format!("expected an integer, got {v}")))?;
                out.push(i32::try_from(n).map_err(|_| {
                    InferError::InvalidInput(format!("integer {n} out of range for int32"))
                })?);
            }
            TensorData::I32(out)
        }
        ElementType::I64 => {
            let mut out = Vec::with_capacity(leaves.len());
            for v in leaves {
                out.push(
                    v.as_i64()
                        .ok_or_else(|| InferError::InvalidInput(format!("expected an integer, got {v}")))?,
                );
            }
            TensorData::I64(out)
        }
        ElementType::Bool => {
            let mut out = Vec::with_capacity(leaves.len());
            for v in leaves {
                out.push(
                    v.as_bool()
                        .ok_or_else(|| InferError::InvalidInput(format!("expected a bool, got {v}")))?,
                );
            }
            TensorData::Bool(out)
        }
    };
    Ok((dims, data))
}

/// Encode a typed, shaped tensor back into a nested JSON list (the JSON
/// response path, which never carries raw bytes).
pub fn encode_json(dims: &[u64], data: &TensorData) -> Value {
    fn nest(dims: &[u64], flat: &[Value]) -> Value {
        if dims.is_empty() {
            return flat[0].clone();
        }
        let (head, rest) = (dims[0] as usize, &dims[1..]);
        let stride: usize = rest.iter().map(|&d| d as usize).product::<usize>().max(1);
        let items = (0..head)
            .map(|i| nest(rest, &flat[i * stride..(i + 1) * stride]))
            .collect();
        Value::Array(items)
    }

    let flat: Vec<Value> = match data {
        TensorData::F32(v) => v.iter().map(|x| serde_json::json!(x)).collect(),
        TensorData::F64(v) => v.iter().map(|x| serde_json::json!(x)).collect(),
        TensorData::I32(v) => v.iter().map(|x| serde_json::json!(x)).collect(),
        TensorData::I64(v) => v.iter().map(|x| serde_json::json!(x)).collect(),
        TensorData::Bool(v) => v.iter().map(|x| serde_json::json!(x)).collect(),
    };
    nest(dims, &flat)
}
