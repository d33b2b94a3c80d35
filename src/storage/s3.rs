use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;
use aws_types::region::Region;
use tracing::{debug, error, info};

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::error::{Result, ServiceError};

/// Stores images in Amazon S3 or an S3-compatible service
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: &StorageConfig) -> Self {
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        // Static credentials when given, otherwise the default provider chain
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let creds = Credentials::new(access_key_id, secret_access_key, None, None, "leafy-s3");
            aws_config_builder = aws_config_builder.credentials_provider(creds);
        }

        let aws_config = aws_config_builder.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(endpoint_url) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_public(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        debug!(bucket = %self.bucket, key, size = data.len(), "Uploading object to S3");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %self.bucket, key, error = %e, "Failed to upload object to S3");
                ServiceError::Storage(format!("Failed to upload {}: {}", key, e))
            })?;

        info!(bucket = %self.bucket, key, "Stored object in S3");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %self.bucket, key, error = %e, "Failed to delete object from S3");
                ServiceError::Storage(format!("Failed to delete {}: {}", key, e))
            })?;

        info!(bucket = %self.bucket, key, "Deleted object from S3");
        Ok(())
    }

    fn storage_type(&self) -> &'static str {
        "s3"
    }
}
