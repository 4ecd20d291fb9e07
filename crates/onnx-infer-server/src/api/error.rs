//! JSON transport's error translation table (C6): the single place that
//! maps the transport-independent [`InferError`] taxonomy to an HTTP
//! status and body.

use onnx_infer_core::InferError;
use salvo::prelude::*;
use serde::Serialize;

/// `{"error": "<reason>"}` — a single human-readable reason string, no
/// stack traces, no internal detail beyond what's safe to show a caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JsonErrorBody {
    pub error: String,
}

/// Wraps an [`InferError`] so it can be returned directly from a handler
/// and rendered by Salvo's `Writer` trait.
#[derive(Debug)]
pub struct ApiError(pub InferError);

impl From<InferError> for ApiError {
    fn from(err: InferError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            InferError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            InferError::ModelNotDeployed(_) => StatusCode::BAD_REQUEST,
            InferError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            InferError::Cancelled => StatusCode::from_u16(499).unwrap(),
            InferError::StorageUnavailable(_)
            | InferError::ModelLoadFailed(_)
            | InferError::InternalInferenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind_tag(&self) -> &'static str {
        match &self.0 {
            InferError::InvalidInput(_) => "invalid_input",
            InferError::ModelNotFound(_) => "model_not_found",
            InferError::ModelNotDeployed(_) => "model_not_deployed",
            InferError::StorageUnavailable(_) => "storage_unavailable",
            InferError::ModelLoadFailed(_) => "model_load_failed",
            InferError::InternalInferenceError(_) => "internal_inference_error",
            InferError::Cancelled => "cancelled",
        }
    }
}

#[async_trait]
impl Writer for ApiError {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(self.status_code());
        res.render(Json(JsonErrorBody {
            error: self.0.to_string(),
        }));
    }
}

impl EndpointOutRegister for ApiError {
    fn register(_components: &mut salvo::oapi::Components, _operation: &mut salvo::oapi::Operation) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError(InferError::ModelNotFound("ghost.onnx".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind_tag(), "model_not_found");
    }

    #[test]
    fn not_deployed_maps_to_400() {
        let err = ApiError(InferError::ModelNotDeployed("pending.onnx".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let err = ApiError(InferError::InvalidInput("bad shape".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_and_load_and_runtime_errors_map_to_500() {
        for err in [
            InferError::StorageUnavailable("down".into()),
            InferError::ModelLoadFailed("corrupt".into()),
            InferError::InternalInferenceError("boom".into()),
        ] {
            assert_eq!(ApiError(err).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn cancelled_maps_to_499() {
        let err = ApiError(InferError::Cancelled);
        assert_eq!(err.status_code().as_u16(), 499);
    }
}
