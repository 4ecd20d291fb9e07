//! Metadata store and blob store implementations backed by MongoDB and its
//! GridFS bucket, wired against the core crate's duck-typed trait seams.

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::gridfs::GridFsBucket;
use mongodb::{Client, Collection};
use onnx_infer_core::{BlobStore, InferError, MetadataStore, ModelRecord, ModelStatus, Result};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;

#[derive(Debug, Deserialize)]
struct ModelDoc {
    name: String,
    version: u64,
    file_id: ObjectId,
    status: String,
}

fn status_from_str(raw: &str) -> Option<ModelStatus> {
    match raw {
        "Deployed" => Some(ModelStatus::Deployed),
        "Uploaded" => Some(ModelStatus::Uploaded),
        _ => None,
    }
}

pub struct MongoMetadataStore {
    client: Client,
    collection: Collection<ModelDoc>,
}

impl MongoMetadataStore {
    pub fn new(client: Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("models");
        Self { client, collection }
    }
}

#[async_trait]
impl MetadataStore for MongoMetadataStore {
    async fn find_all_by_name(&self, name: &str) -> Result<Vec<ModelRecord>> {
        let mut cursor = self
            .collection
            .find(doc! { "name": name })
            .await
            .map_err(|e| InferError::StorageUnavailable(e.to_string()))?;

        let mut records = Vec::new();
        use futures::stream::TryStreamExt;
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| InferError::StorageUnavailable(e.to_string()))?
        {
            let Some(status) = status_from_str(&doc.status) else {
                continue;
            };
            records.push(ModelRecord {
                name: doc.name,
                version: doc.version,
                file_id: doc.file_id.to_hex(),
                status,
            });
        }
        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| InferError::StorageUnavailable(e.to_string()))
    }
}

pub struct GridFsBlobStore {
    bucket: GridFsBucket,
}

impl GridFsBlobStore {
    pub fn new(client: Client, db_name: &str) -> Self {
        let bucket = client.database(db_name).gridfs_bucket(None);
        Self { bucket }
    }
}

#[async_trait]
impl BlobStore for GridFsBlobStore {
    async fn read(&self, blob_id: &str) -> Result<Vec<u8>> {
        let oid = ObjectId::parse_str(blob_id)
            .map_err(|e| InferError::InvalidInput(format!("invalid blob id: {e}")))?;
        let stream = self
            .bucket
            .open_download_stream(oid.into())
            .await
            .map_err(|e| InferError::StorageUnavailable(e.to_string()))?;
        let mut reader = stream.compat();
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| InferError::StorageUnavailable(e.to_string()))?;
        Ok(buf)
    }
}
