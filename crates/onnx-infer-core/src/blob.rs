//! The blob reader (C2): streams an artifact's bytes by id from the blob
//! store, fully into memory.

use async_trait::async_trait;

use crate::error::Result;

/// The minimal capability the session cache needs to fetch model bytes.
///
/// Grounded in the "duck-typed blob bucket" design: the cache only needs
/// "open a readable by id", not the full upload/delete surface the deploy
/// collaborator uses.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the full artifact for `blob_id` into memory.
    ///
    /// Implementations must release any stream handle they acquire before
    /// returning, on every path, including error paths.
    async fn read(&self, blob_id: &str) -> Result<Vec<u8>>;
}
