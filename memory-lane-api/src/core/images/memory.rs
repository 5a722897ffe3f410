use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use super::{ImageStore, normalize_base_url};

/// In-memory implementation of [`ImageStore`]. Objects are lost on exit.
pub struct InMemoryImageStore {
    objects: RwLock<HashMap<String, (Bytes, String)>>,
    base_url: String,
}

impl InMemoryImageStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            base_url: normalize_base_url(base_url),
        }
    }
}

#[cfg(test)]
impl InMemoryImageStore {
    pub fn get(&self, path: &str) -> Option<(Bytes, String)> {
        self.objects.read().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.objects
            .write()
            .insert(path.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write();
        for path in paths {
            if objects.remove(path).is_none() {
                debug!("Image {} was already gone", path);
            }
        }
        Ok(())
    }

    fn public_base_url(&self) -> &str {
        &self.base_url
    }
}

/// Accepts uploads but can never delete, like a bucket that went away.
#[cfg(test)]
pub struct FailingImageStore {
    inner: InMemoryImageStore,
}

#[cfg(test)]
impl FailingImageStore {
    pub const CAUSE: &'static str = "bucket unreachable";

    pub fn new(base_url: &str) -> Self {
        Self {
            inner: InMemoryImageStore::new(base_url),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ImageStore for FailingImageStore {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.inner.put(path, data, content_type).await
    }

    async fn delete(&self, _paths: &[String]) -> Result<()> {
        anyhow::bail!(Self::CAUSE)
    }

    fn public_base_url(&self) -> &str {
        self.inner.public_base_url()
    }
}
