use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use percent_encoding::percent_decode_str;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ObjectStorage, StorageConnector, StorageError, content_type};
use crate::config::settings::StorageConfig;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| StorageError::Config("AWS_BUCKET is not set".to_string()))?;
        let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) else {
            return Err(StorageError::Config(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required".to_string(),
            ));
        };

        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            // Custom endpoints (MinIO and friends) need path-style addressing.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!(bucket = %bucket, region = %config.region, "S3 client ready");

        Ok(Self { client, bucket })
    }

    async fn fetch(&self, key: &str, dest: &Path) -> Result<u64, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Download {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(StorageError::io(dest))?;

        let mut body = output.body;
        let mut written = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(|e| StorageError::Download {
            key: key.to_string(),
            message: e.to_string(),
        })? {
            file.write_all(&chunk).await.map_err(StorageError::io(dest))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(StorageError::io(dest))?;

        Ok(written)
    }

    async fn put(&self, src: &Path, key: &str) -> Result<(), StorageError> {
        let content_type = content_type(src);
        info!(
            "Uploading {} -> s3://{}/{} ({})",
            src.display(),
            self.bucket,
            key,
            content_type
        );

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for StorageService {
    async fn download(
        &self,
        key: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, StorageError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::io(parent))?;
        }

        let key = decode_key(key);
        info!("Downloading s3://{}/{} -> {}", self.bucket, key, dest.display());

        let written = tokio::select! {
            _ = cancel.cancelled() => return Err(StorageError::Cancelled),
            res = self.fetch(&key, dest) => res?,
        };

        info!("Download finished: {} bytes", written);
        Ok(written)
    }

    async fn upload(
        &self,
        src: &Path,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(StorageError::Cancelled),
            res = self.put(src, key) => res,
        }
    }
}

/// Caller-supplied keys may arrive percent-encoded; the SDK expects them raw.
fn decode_key(key: &str) -> Cow<'_, str> {
    match percent_decode_str(key).decode_utf8() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Could not decode key '{}': {}. Using it as is.", key, e);
            Cow::Borrowed(key)
        }
    }
}

/// Builds an [`StorageService`] from the process configuration.
pub struct S3Connector {
    config: StorageConfig,
}

impl S3Connector {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StorageConnector for S3Connector {
    async fn connect(&self) -> Result<Arc<dyn ObjectStorage>, StorageError> {
        Ok(Arc::new(StorageService::new(&self.config)?))
    }
}
