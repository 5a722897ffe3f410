//! Object storage for lane images.
//!
//! Entries store an image *reference*: usually the public URL handed back by
//! an upload, sometimes a bare object key. [`ImageManager`] resolves both
//! forms back to object keys when rows are deleted.

mod memory;
mod s3;

pub use memory::InMemoryImageStore;
#[cfg(test)]
pub use memory::FailingImageStore;
pub use s3::S3ImageStore;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::error::{ServiceError, ServiceResult};

/// Trait for image storage backends
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Remove objects by key. Missing keys are not an error.
    async fn delete(&self, paths: &[String]) -> Result<()>;

    /// Base URL objects are publicly served from, ending in `/`
    fn public_base_url(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImage {
    pub path: String,
    pub url: String,
}

pub(crate) fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

pub fn public_url(base: &str, path: &str) -> String {
    format!("{}{}", normalize_base_url(base), path.trim_start_matches('/'))
}

/// Map an image reference to an object key in this bucket.
///
/// Returns `None` for URLs that point somewhere else.
pub fn path_from_reference(base: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    let base = normalize_base_url(base);

    let path = match reference.strip_prefix(base.as_str()) {
        Some(rest) => rest,
        None if reference.contains("://") => return None,
        None => reference,
    };

    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_start_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/heic" => "heic",
        "image/svg+xml" => "svg",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

pub fn object_key(content_type: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), extension_for(content_type))
}

/// Validates uploads and keeps stored objects in step with deleted rows.
pub struct ImageManager {
    store: Arc<dyn ImageStore>,
    max_upload_bytes: usize,
}

impl ImageManager {
    pub fn new(store: Arc<dyn ImageStore>, max_upload_bytes: usize) -> Self {
        Self {
            store,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn upload(&self, data: Bytes, content_type: &str) -> ServiceResult<StoredImage> {
        if !content_type.starts_with("image/") {
            return Err(ServiceError::Validation(format!(
                "Only images can be uploaded, got {content_type}"
            )));
        }
        if data.is_empty() {
            return Err(ServiceError::Validation("Image is empty".to_string()));
        }
        if data.len() > self.max_upload_bytes {
            return Err(ServiceError::PayloadTooLarge(format!(
                "Image exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }

        let path = object_key(content_type);
        let size = data.len();
        self.store
            .put(&path, data, content_type)
            .await
            .map_err(ServiceError::storage("Failed to upload image"))?;

        info!("Stored image {} ({} bytes)", path, size);
        Ok(StoredImage {
            url: public_url(self.store.public_base_url(), &path),
            path,
        })
    }

    pub async fn delete(&self, path: &str) -> ServiceResult<()> {
        let Some(path) = path_from_reference(self.store.public_base_url(), path) else {
            return Err(ServiceError::Validation("Invalid image path".to_string()));
        };

        self.store
            .delete(&[path])
            .await
            .map_err(ServiceError::storage("Failed to delete image"))
    }

    /// Whether two references name the same object in this bucket.
    pub fn same_object(&self, a: &str, b: &str) -> bool {
        let base = self.store.public_base_url();
        match (path_from_reference(base, a), path_from_reference(base, b)) {
            (Some(a), Some(b)) => a == b,
            _ => a.trim() == b.trim(),
        }
    }

    /// Remove the objects behind a batch of entry image references.
    pub async fn release(&self, references: &[String]) -> ServiceResult<()> {
        let base = self.store.public_base_url();
        let mut paths = BTreeSet::new();
        for reference in references {
            match path_from_reference(base, reference) {
                Some(path) => {
                    paths.insert(path);
                },
                None => warn!("Skipping image outside the bucket: {}", reference),
            }
        }

        if paths.is_empty() {
            return Ok(());
        }

        let paths: Vec<String> = paths.into_iter().collect();
        self.store
            .delete(&paths)
            .await
            .map_err(ServiceError::storage("Failed to delete images"))
    }
}
