//! Object storage for plant images.
//!
//! There is no transactional coupling between the bucket and the database,
//! so callers order their writes: upload before committing a record, delete
//! the object before deleting its record.

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` and make it publicly readable
    async fn put_public(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
    /// Remove the object stored under `key`
    async fn delete(&self, key: &str) -> Result<()>;
    fn storage_type(&self) -> &'static str;
}

/// Build the configured backend
pub async fn connect_storage(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        StorageBackend::S3 => {
            tracing::info!(
                bucket = %config.bucket,
                region = %config.region,
                "Using S3 object storage"
            );
            Arc::new(S3ObjectStore::new(config).await)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object storage; uploaded images will not persist");
            Arc::new(MemoryObjectStore::new())
        }
    }
}
