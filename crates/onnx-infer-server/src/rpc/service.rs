//! RPC transport's error translation table (C7) and the `Predict` handler.

use onnx_infer_core::{ElementType, InferError, Orchestrator, TensorData};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::logging;
use crate::rpc::pb::{
    inference_service_server::InferenceService, DataType, PredictReply, PredictRequest,
    ResponseTensor,
};

fn status_from_infer_error(err: &InferError) -> Status {
    match err {
        InferError::ModelNotFound(m) => Status::not_found(m.clone()),
        InferError::ModelNotDeployed(m) => Status::failed_precondition(m.clone()),
        InferError::InvalidInput(m) => Status::invalid_argument(m.clone()),
        InferError::Cancelled => Status::cancelled("request cancelled"),
        InferError::StorageUnavailable(m)
        | InferError::ModelLoadFailed(m)
        | InferError::InternalInferenceError(m) => Status::internal(m.clone()),
    }
}

fn element_type_from_proto(dt: DataType) -> Option<ElementType> {
    match dt {
        DataType::Float32 => Some(ElementType::F32),
        DataType::Float64 => Some(ElementType::F64),
        DataType::Int32 => Some(ElementType::I32),
        DataType::Int64 => Some(ElementType::I64),
        DataType::Bool => Some(ElementType::Bool),
        DataType::Unspecified | DataType::String => None,
    }
}

fn proto_from_element_type(ty: ElementType) -> DataType {
    match ty {
        ElementType::F32 => DataType::Float32,
        ElementType::F64 => DataType::Float64,
        ElementType::I32 => DataType::Int32,
        ElementType::I64 => DataType::Int64,
        ElementType::Bool => DataType::Bool,
    }
}

fn encode_bytes_for(data: &TensorData) -> Vec<u8> {
    onnx_infer_core::tensor::encode_bytes(data)
}

pub struct InferenceServiceImpl {
    orchestrator: Arc<Orchestrator>,
}

impl InferenceServiceImpl {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[tonic::async_trait]
impl InferenceService for InferenceServiceImpl {
    async fn predict(
        &self,
        request: Request<PredictRequest>,
    ) -> Result<Response<PredictReply>, Status> {
        let request_id = Uuid::new_v4().to_string();
        let timer = logging::RequestTimer::start();
        let req = request.into_inner();

        if req.model_name.is_empty() {
            return Err(Status::invalid_argument("model_name must not be empty"));
        }
        let Some(input) = req.input else {
            return Err(Status::invalid_argument("input must be set"));
        };
        if input.dims.is_empty() {
            return Err(Status::invalid_argument("dims must not be empty"));
        }
        let data_type = DataType::try_from(input.data_type)
            .map_err(|_| Status::invalid_argument("unrecognized data_type"))?;
        if data_type == DataType::String {
            return Err(Status::invalid_argument("string tensors are not supported"));
        }

        let dims: Vec<u64> = input.dims.iter().map(|&d| d as u64).collect();
        let provided_name = (!input.name.is_empty()).then_some(input.name.as_str());
        let declared_dtype = element_type_from_proto(data_type).map(|t| t.tag());

        let request_bytes = input.tensor_content.len();
        let result = self
            .orchestrator
            .predict_bytes(
                &req.model_name,
                &dims,
                &input.tensor_content,
                provided_name,
                declared_dtype,
            )
            .await;

        let status_tag = match &result {
            Ok(_) => "ok",
            Err(e) => match e {
                InferError::InvalidInput(_) => "invalid_input",
                InferError::ModelNotFound(_) => "model_not_found",
                InferError::ModelNotDeployed(_) => "model_not_deployed",
                InferError::StorageUnavailable(_) => "storage_unavailable",
                InferError::ModelLoadFailed(_) => "model_load_failed",
                InferError::InternalInferenceError(_) => "internal_inference_error",
                InferError::Cancelled => "cancelled",
            },
        };

        let (out_dims, out_data) = result.map_err(|e| {
            logging::predict::complete(
                &request_id,
                "rpc",
                &req.model_name,
                status_tag,
                declared_dtype.unwrap_or("unspecified"),
                &format!("{dims:?}"),
                "n/a",
                timer.elapsed_ms(),
                request_bytes,
                0,
            );
            status_from_infer_error(&e)
        })?;

        let out_proto_dtype = proto_from_element_type(out_data.dtype());
        let tensor_content = encode_bytes_for(&out_data);
        let response_bytes = tensor_content.len();

        logging::predict::complete(
            &request_id,
            "rpc",
            &req.model_name,
            status_tag,
            declared_dtype.unwrap_or("unspecified"),
            &format!("{dims:?}"),
            &format!("{out_dims:?}"),
            timer.elapsed_ms(),
            request_bytes,
            response_bytes,
        );

        Ok(Response::new(PredictReply {
            outputs: vec![ResponseTensor {
                name: String::new(),
                dims: out_dims.iter().map(|&d| d as i64).collect(),
                tensor_content,
                data_type: out_proto_dtype as i32,
            }],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::pb::RequestTensor;
    use onnx_infer_core::ModelRecord;

    fn sigmoid_request(dims: Vec<i64>, content: Vec<u8>) -> PredictRequest {
        PredictRequest {
            model_name: "sigmoid.onnx".to_string(),
            input: Some(RequestTensor {
                name: String::new(),
                dims,
                tensor_content: content,
                data_type: DataType::Float32 as i32,
            }),
        }
    }

    fn le_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[tokio::test]
    async fn sigmoid_model_returns_ok() {
        let orchestrator = crate::test_support::fake_orchestrator(vec![
            crate::test_support::deployed_record("sigmoid.onnx"),
        ]);
        let svc = InferenceServiceImpl::new(orchestrator);
        let content = le_bytes(&[1.0, -1.0, 0.0, 2.0]);
        let resp = svc
            .predict(Request::new(sigmoid_request(vec![2, 2], content)))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(resp.outputs.len(), 1);
        let out = &resp.outputs[0];
        assert_eq!(out.dims, vec![2, 2]);
        assert_eq!(out.data_type, DataType::Float32 as i32);
        let decoded: Vec<f32> = out
            .tensor_content
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        let expected = [1.0f32, -1.0, 0.0, 2.0].map(|x| 1.0 / (1.0 + (-x).exp()));
        for (got, want) in decoded.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn ghost_model_not_found() {
        let orchestrator = crate::test_support::fake_orchestrator(vec![]);
        let svc = InferenceServiceImpl::new(orchestrator);
        let req = PredictRequest {
            model_name: "ghost.onnx".to_string(),
            ..sigmoid_request(vec![2, 2], le_bytes(&[0.0; 4]))
        };
        let err = svc.predict(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn pending_model_not_deployed() {
        let orchestrator = crate::test_support::fake_orchestrator(vec![ModelRecord {
            status: onnx_infer_core::ModelStatus::Uploaded,
            ..crate::test_support::deployed_record("pending.onnx")
        }]);
        let svc = InferenceServiceImpl::new(orchestrator);
        let req = PredictRequest {
            model_name: "pending.onnx".to_string(),
            ..sigmoid_request(vec![2, 2], le_bytes(&[0.0; 4]))
        };
        let err = svc.predict(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::FailedPrecondition);
    }

    /// P6: the RPC and JSON transports must agree on the sigmoid model's
    /// output for the same input (mirrors `api::json::tests::sigmoid_model_returns_200`).
    #[tokio::test]
    async fn parity_with_json_transport() {
        let rpc_orchestrator = crate::test_support::fake_orchestrator(vec![
            crate::test_support::deployed_record("sigmoid.onnx"),
        ]);
        let json_orchestrator = crate::test_support::fake_orchestrator(vec![
            crate::test_support::deployed_record("sigmoid.onnx"),
        ]);

        let svc = InferenceServiceImpl::new(rpc_orchestrator);
        let content = le_bytes(&[1.0, -1.0, 0.0, 2.0]);
        let rpc_out = svc
            .predict(Request::new(sigmoid_request(vec![2, 2], content)))
            .await
            .unwrap()
            .into_inner();
        let rpc_values: Vec<f32> = rpc_out.outputs[0]
            .tensor_content
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        let input = serde_json::json!([[1.0, -1.0], [0.0, 2.0]]);
        let (_, _, json_out) = json_orchestrator
            .predict_json("sigmoid.onnx", &input, None)
            .await
            .unwrap();
        let json_values: Vec<f64> = json_out
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|row| row.as_array().unwrap().iter().map(|v| v.as_f64().unwrap()))
            .collect();

        for (rpc_v, json_v) in rpc_values.iter().zip(json_values.iter()) {
            assert!((*rpc_v as f64 - json_v).abs() < 1e-5);
        }
    }
}
