//! `POST /infer/{name}`, plus the `/healthz` and `/readyz` probes the
//! lifecycle controller drives (§10.5: restored from the source's REST
//! app, dropped by the distillation).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use onnx_infer_core::Orchestrator;
use salvo::affix_state;
use salvo::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::request_id::{request_id_handler, RequestId};
use crate::logging;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InferRequest {
    pub input: serde_json::Value,
    #[serde(default)]
    pub dtype: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InferResponse {
    pub results: serde_json::Value,
}

#[handler]
async fn infer(req: &mut Request, depot: &mut Depot) -> Result<Json<InferResponse>, ApiError> {
    let model_name = req.param::<String>("name").unwrap_or_default();
    let body: InferRequest = req.parse_json().await.map_err(|e| {
        ApiError(onnx_infer_core::InferError::InvalidInput(e.to_string()))
    })?;

    let request_id = depot
        .get::<RequestId>("request_id")
        .map(|r| r.to_string())
        .unwrap_or_default();
    let orchestrator = depot
        .obtain::<Arc<Orchestrator>>()
        .expect("orchestrator must be injected into the depot")
        .clone();

    let timer = logging::RequestTimer::start();
    let request_bytes = serde_json::to_vec(&body.input).map(|v| v.len()).unwrap_or(0);

    let result = orchestrator
        .predict_json(&model_name, &body.input, body.dtype.as_deref())
        .await;

    let status = match &result {
        Ok(_) => "ok",
        Err(e) => ApiError(clone_infer_error(e)).kind_tag(),
    };
    let (in_dims, out_dims, response_bytes) = match &result {
        Ok((in_dims, out_dims, results)) => (
            format!("{in_dims:?}"),
            format!("{out_dims:?}"),
            serde_json::to_vec(results).map(|v| v.len()).unwrap_or(0),
        ),
        Err(_) => ("n/a".to_string(), "n/a".to_string(), 0),
    };
    logging::predict::complete(
        &request_id,
        "json",
        &model_name,
        status,
        body.dtype.as_deref().unwrap_or("unspecified"),
        &in_dims,
        &out_dims,
        timer.elapsed_ms(),
        request_bytes,
        response_bytes,
    );

    let (_, _, results) = result.map_err(ApiError::from)?;
    Ok(Json(InferResponse { results }))
}

fn clone_infer_error(e: &onnx_infer_core::InferError) -> onnx_infer_core::InferError {
    use onnx_infer_core::InferError::*;
    match e {
        InvalidInput(s) => InvalidInput(s.clone()),
        ModelNotFound(s) => ModelNotFound(s.clone()),
        ModelNotDeployed(s) => ModelNotDeployed(s.clone()),
        StorageUnavailable(s) => StorageUnavailable(s.clone()),
        ModelLoadFailed(s) => ModelLoadFailed(s.clone()),
        InternalInferenceError(s) => InternalInferenceError(s.clone()),
        Cancelled => Cancelled,
    }
}

/// Always 200 once the process is accepting connections.
#[handler]
async fn healthz(res: &mut Response) {
    res.render(Json(serde_json::json!({"status": "ok"})));
}

/// 200 while the readiness monitor's last metadata-store ping succeeded,
/// 503 otherwise.
#[handler]
async fn readyz(depot: &mut Depot, res: &mut Response) {
    let ready = depot
        .obtain::<Arc<AtomicBool>>()
        .map(|r| r.load(Ordering::SeqCst))
        .unwrap_or(false);
    if ready {
        res.render(Json(serde_json::json!({"status": "ready"})));
    } else {
        res.status_code(StatusCode::SERVICE_UNAVAILABLE);
        res.render(Json(serde_json::json!({"status": "not ready"})));
    }
}

/// Builds the JSON transport's router. `orchestrator` and `ready` are
/// injected into every request's [`Depot`] via affix state.
pub fn router(orchestrator: Arc<Orchestrator>, ready: Arc<AtomicBool>) -> Router {
    Router::new()
        .hoop(affix_state::inject(orchestrator).inject(ready))
        .hoop(request_id_handler)
        .push(Router::with_path("infer/{name}").post(infer))
        .push(Router::with_path("healthz").get(healthz))
        .push(Router::with_path("readyz").get(readyz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvo::test::TestClient;

    fn test_service(orchestrator: Arc<Orchestrator>) -> Service {
        Service::new(router(orchestrator, Arc::new(AtomicBool::new(true))))
    }

    #[tokio::test]
    async fn healthz_always_ok() {
        let service = test_service(crate::test_support::fake_orchestrator(vec![]));
        let res = TestClient::get("http://127.0.0.1:5800/healthz")
            .send(&service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn readyz_reflects_flag() {
        let not_ready = Arc::new(AtomicBool::new(false));
        let service = Service::new(router(
            crate::test_support::fake_orchestrator(vec![]),
            not_ready,
        ));
        let res = TestClient::get("http://127.0.0.1:5800/readyz")
            .send(&service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn missing_model_is_404() {
        let service = test_service(crate::test_support::fake_orchestrator(vec![]));
        let res = TestClient::post("http://127.0.0.1:5800/infer/ghost.onnx")
            .json(&serde_json::json!({"input": [1.0]}))
            .send(&service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn sigmoid_model_returns_200() {
        let service = test_service(crate::test_support::fake_orchestrator(vec![
            crate::test_support::deployed_record("sigmoid.onnx"),
        ]));
        let res = TestClient::post("http://127.0.0.1:5800/infer/sigmoid.onnx")
            .json(&serde_json::json!({"input": [[1.0, -1.0], [0.0, 2.0]]}))
            .send(&service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
    }
}
