//! Shared fixtures for unit tests.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::{AuthConfig, Config, StorageBackend};
use crate::error::{Result, ServiceError};
use crate::storage::{MemoryObjectStore, ObjectStore};
use crate::{AppState, DbPool};

/// Auth settings with the cheapest Argon2 parameters the crate accepts
pub fn fast_auth_config() -> AuthConfig {
    AuthConfig {
        hash_memory_kib: 64,
        hash_iterations: 1,
        hash_parallelism: 1,
        ..AuthConfig::default()
    }
}

pub async fn memory_pool() -> DbPool {
    crate::db::init_memory().await.unwrap()
}

/// WAL-mode database file behind a pool with several connections, so
/// concurrent work really interleaves. Keep the directory alive for the test.
pub async fn file_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("leafy.db").display());
    let pool = crate::db::init(&url, 5).await.unwrap();
    (dir, pool)
}

/// Application state over an in-memory database and object store
pub async fn test_state() -> (Arc<AppState>, Arc<MemoryObjectStore>) {
    let mut config = Config::default();
    config.auth = fast_auth_config();
    config.storage.backend = StorageBackend::Memory;

    let storage = Arc::new(MemoryObjectStore::new());
    let state = AppState::new(config, memory_pool().await, storage.clone()).unwrap();
    (Arc::new(state), storage)
}

/// Encode a solid-colour image of the given size
pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = match format {
        ImageFormat::Gif => {
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, [30, 160, 60, 255].into()))
        }
        _ => DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, [30, 160, 60].into())),
    };

    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

pub fn png_data_uri(width: u32, height: u32) -> String {
    data_uri("image/png", &encode_image(width, height, ImageFormat::Png))
}

/// Object store whose every call fails
pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put_public(&self, key: &str, _data: Vec<u8>, _content_type: &str) -> Result<()> {
        Err(ServiceError::Storage(format!("upload of {} refused", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Err(ServiceError::Storage(format!("delete of {} refused", key)))
    }

    fn storage_type(&self) -> &'static str {
        "failing"
    }
}
