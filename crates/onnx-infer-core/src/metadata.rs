//! The metadata resolver (C1): looks up the deployed artifact id for a
//! model name.

use async_trait::async_trait;

use crate::error::{InferError, Result};

/// Deployment status of a [`ModelRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Uploaded,
    Deployed,
}

/// A row in the external model catalog. The core only reads this; the
/// upload/deploy/undeploy surface that writes it is an external collaborator.
#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub name: String,
    pub version: u64,
    pub file_id: String,
    pub status: ModelStatus,
}

/// The minimal capability the orchestrator needs from the metadata store:
/// list every record for a name, and answer whether the store is alive.
///
/// Kept narrow and duck-typed on purpose so tests can substitute an
/// in-memory fake instead of a real store connection.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn find_all_by_name(&self, name: &str) -> Result<Vec<ModelRecord>>;

    /// Liveness probe used by the readiness monitor (C8).
    async fn ping(&self) -> Result<()>;
}

/// Resolve `name` to the blob id of its deployed record.
///
/// Scans in storage order and returns the first record whose status is
/// `Deployed`. If multiple records are deployed for the same name, the first
/// one encountered wins; this mirrors the observed behavior of the system
/// this was distilled from rather than treating it as an error.
pub async fn resolve(store: &dyn MetadataStore, name: &str) -> Result<String> {
    let records = store.find_all_by_name(name).await?;
    if records.is_empty() {
        return Err(InferError::ModelNotFound(name.to_string()));
    }
    records
        .into_iter()
        .find(|r| r.status == ModelStatus::Deployed)
        .map(|r| r.file_id)
        .ok_or_else(|| InferError::ModelNotDeployed(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        records: Mutex<Vec<ModelRecord>>,
        ping_ok: Mutex<bool>,
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
            if *self.ping_ok.lock().unwrap() {
                Ok(())
            } else {
                Err(InferError::StorageUnavailable("down".into()))
            }
        }
    }

    fn record(name: &str, status: ModelStatus, file_id: &str) -> ModelRecord {
        ModelRecord {
            name: name.to_string(),
            version: 1,
            file_id: file_id.to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn not_found_when_no_records() {
        let store = FakeStore::default();
        let err = resolve(&store, "ghost.onnx").await.unwrap_err();
        assert!(matches!(err, InferError::ModelNotFound(n) if n == "ghost.onnx"));
    }

    #[tokio::test]
    async fn not_deployed_when_none_marked_deployed() {
        let store = FakeStore::default();
        store
            .records
            .lock()
            .unwrap()
            .push(record("pending.onnx", ModelStatus::Uploaded, "abc"));
        let err = resolve(&store, "pending.onnx").await.unwrap_err();
        assert!(matches!(err, InferError::ModelNotDeployed(n) if n == "pending.onnx"));
    }

    #[tokio::test]
    async fn first_deployed_record_wins() {
        let store = FakeStore::default();
        {
            let mut recs = store.records.lock().unwrap();
            recs.push(record("dup.onnx", ModelStatus::Deployed, "first"));
            recs.push(record("dup.onnx", ModelStatus::Deployed, "second"));
        }
        let id = resolve(&store, "dup.onnx").await.unwrap();
        assert_eq!(id, "first");
    }
}
