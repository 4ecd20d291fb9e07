//! Shared test fakes for the JSON and RPC transport integration tests.
//! Mirrors the donor's `tests/common/mocks.rs` pattern of hand-rolled fakes
//! over a trait seam rather than a mocking framework.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use onnx_infer_core::{
    BlobStore, CacheConfig, Dim, ElementType, InferError, InferenceSession, MetadataStore,
    ModelRecord, ModelSignature, ModelStatus, Orchestrator, Result, SessionCache, SessionLoader,
    TensorData,
};

pub fn deployed_record(name: &str) -> ModelRecord {
    ModelRecord {
        name: name.to_string(),
        version: 1,
        file_id: "000000000000000000000001".to_string(),
        status: ModelStatus::Deployed,
    }
}

struct FakeStore {
    records: Mutex<Vec<ModelRecord>>,
}

#[async_trait]
impl MetadataStore for FakeStore {
    async fn find_all_by_name(&self, name: &str) -> Result<Vec<ModelRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct FakeBlob;

#[async_trait]
impl BlobStore for FakeBlob {
    async fn read(&self, _blob_id: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

struct SigmoidSession;

#[async_trait]
impl InferenceSession for SigmoidSession {
    fn signature(&self) -> ModelSignature {
        ModelSignature {
            input_name: "x".into(),
            input_element_type: Some(ElementType::F32),
            input_shape: vec![Dim::Any, Dim::Fixed(2)],
            output_name: "y".into(),
        }
    }

    async fn run(&self, input: TensorData, dims: &[u64]) -> Result<(Vec<u64>, TensorData)> {
        let TensorData::F32(v) = input else {
            return Err(InferError::InvalidInput("expected f32".into()));
        };
        let out = v.iter().map(|x| 1.0 / (1.0 + (-x).exp())).collect();
        Ok((dims.to_vec(), TensorData::F32(out)))
    }
}

struct SigmoidLoader;

#[async_trait]
impl SessionLoader for SigmoidLoader {
    async fn load(&self, _bytes: Vec<u8>) -> Result<Arc<dyn InferenceSession>> {
        Ok(Arc::new(SigmoidSession))
    }
}

/// An orchestrator wired to in-memory fakes: `records` seeds the metadata
/// store, every deployed blob id resolves to a sigmoid-like session.
pub fn fake_orchestrator(records: Vec<ModelRecord>) -> Arc<Orchestrator> {
    let store = Arc::new(FakeStore {
        records: Mutex::new(records),
    });
    let cache = Arc::new(SessionCache::new(
        CacheConfig::default(),
        Arc::new(FakeBlob),
        Arc::new(SigmoidLoader),
    ));
    Arc::new(Orchestrator::new(store, cache))
}
