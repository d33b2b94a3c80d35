use async_trait::async_trait;
use dashmap::DashMap;

use super::ObjectStore;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub public: bool,
}

/// In-process object store (useful for testing and local development)
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_public(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                public: true,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // Deleting a missing key succeeds, like S3
        self.objects.remove(key);
        Ok(())
    }

    fn storage_type(&self) -> &'static str {
        "memory"
    }
}
