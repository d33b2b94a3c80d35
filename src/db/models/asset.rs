//! Image asset models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Asset {
    pub id: i64,
    pub plant_id: i64,
    pub base_url: String,
    pub salt: String,
    pub extension: String,
    pub width: i64,
    pub height: i64,
    pub created_at: String,
}

impl Asset {
    /// Object key inside the bucket
    pub fn object_key(&self) -> String {
        format!("{}.{}", self.salt, self.extension)
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.object_key())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetResponse {
    pub url: String,
}

impl From<&Asset> for AssetResponse {
    fn from(asset: &Asset) -> Self {
        Self { url: asset.url() }
    }
}
