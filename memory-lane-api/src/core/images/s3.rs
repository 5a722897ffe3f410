use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;
use tracing::{debug, info};

use super::{ImageStore, normalize_base_url};
use crate::core::config::StorageConfig;

/// S3's DeleteObjects limit.
const DELETE_BATCH: usize = 1000;

/// S3-compatible implementation of [`ImageStore`]
///
/// Works against AWS as well as Supabase Storage or MinIO through a custom
/// endpoint with path-style addressing.
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| anyhow!("storage.bucket is required for the s3 backend"))?;

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .force_path_style(config.force_path_style);

        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "memory-lane-config",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }

        let public_base_url = match (&config.public_base_url, &config.endpoint) {
            (Some(url), _) => normalize_base_url(url),
            (None, Some(endpoint)) => {
                normalize_base_url(&format!("{}/{}", endpoint.trim_end_matches('/'), bucket))
            },
            (None, None) => format!("https://{}.s3.{}.amazonaws.com/", bucket, config.region),
        };

        info!(
            "Using S3 bucket {} (public base {})",
            bucket, public_base_url
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            public_base_url,
        })
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("failed to upload {path} to bucket {}", self.bucket))?;
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        for chunk in paths.chunks(DELETE_BATCH) {
            let objects = chunk
                .iter()
                .map(|path| ObjectIdentifier::builder().key(path).build())
                .collect::<Result<Vec<_>, _>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .with_context(|| format!("failed to delete objects from bucket {}", self.bucket))?;

            if let Some(failure) = output.errors().first() {
                bail!(
                    "failed to delete {} object(s), first: {} ({})",
                    output.errors().len(),
                    failure.key().unwrap_or("?"),
                    failure.message().unwrap_or("unknown error")
                );
            }

            debug!("Deleted {} object(s) from {}", chunk.len(), self.bucket);
        }
        Ok(())
    }

    fn public_base_url(&self) -> &str {
        &self.public_base_url
    }
}
