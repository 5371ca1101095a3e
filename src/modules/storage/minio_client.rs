//! MinIO/S3-compatible blob store
//!
//! Stores one object per file id under a configurable key prefix.
//! Uses the rust-s3 crate for lightweight S3 operations.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use super::blob_store::{is_valid_blob_id, BlobDeleteOutcome, BlobStore};
use crate::core::config::MinIOConfig;
use crate::core::error::{AppError, Result};

/// MinIO/S3-compatible storage client
pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    prefix: String,
}

fn is_missing_object(error: &str) -> bool {
    error.contains("404") || error.contains("NoSuchKey")
}

impl MinIOClient {
    /// Create a new MinIO client from configuration and make sure the
    /// bucket exists
    pub async fn new(config: MinIOConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Storage(format!("Failed to create MinIO bucket: {}", e)))?;

        // Use path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let client = Self {
            bucket,
            region,
            credentials,
            prefix: config.prefix.trim_end_matches('/').to_string(),
        };

        client.ensure_bucket_exists().await;

        info!(
            "MinIO blob store initialized for endpoint: {}, bucket: {}, prefix: {}",
            config.endpoint,
            client.bucket.name(),
            client.prefix
        );

        Ok(client)
    }

    /// Create the bucket; an "already exists" answer is fine
    async fn ensure_bucket_exists(&self) {
        let result = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match result {
            Ok(_) => info!("Bucket '{}' created successfully", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }
    }

    fn key_for(&self, id: &str) -> Result<String> {
        if !is_valid_blob_id(id) {
            return Err(AppError::BadRequest(format!("Invalid file id: {}", id)));
        }
        Ok(format!("{}/{}", self.prefix, id))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.bucket.head_object(key).await {
            Ok((_, status)) => Ok(status != 404),
            Err(e) => {
                let error_str = e.to_string();
                if is_missing_object(&error_str) {
                    Ok(false)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to check if object '{}' exists: {}",
                        key, e
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for MinIOClient {
    async fn put_blob(&self, id: &str, data: &[u8]) -> Result<()> {
        let key = self.key_for(id)?;
        self.bucket
            .put_object_with_content_type(&key, data, "application/octet-stream")
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload object '{}': {}", key, e)))?;

        debug!(
            "Uploaded object '{}' to bucket '{}'",
            key,
            self.bucket.name()
        );
        Ok(())
    }

    async fn read_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let key = self.key_for(id)?;
        match self.bucket.get_object(&key).await {
            Ok(response) if response.status_code() == 404 => Ok(None),
            Ok(response) => Ok(Some(response.to_vec())),
            Err(e) if is_missing_object(&e.to_string()) => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to download object '{}': {}",
                key, e
            ))),
        }
    }

    async fn delete_blob(&self, id: &str) -> Result<BlobDeleteOutcome> {
        let key = self.key_for(id)?;

        // S3 answers deletes of missing keys with 204, so check existence first
        if !self.exists(&key).await? {
            return Ok(BlobDeleteOutcome::NotFound);
        }

        match self.bucket.delete_object(&key).await {
            Ok(_) => {
                debug!(
                    "Deleted object '{}' from bucket '{}'",
                    key,
                    self.bucket.name()
                );
                Ok(BlobDeleteOutcome::Deleted)
            }
            Err(e) if is_missing_object(&e.to_string()) => Ok(BlobDeleteOutcome::NotFound),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete object '{}': {}",
                key, e
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "minio"
    }
}
