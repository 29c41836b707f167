use crate::{
    BackendError, Result,
    blob::{BlobPath, BlobStore, UploadProgress, UploadTask},
    memory::lock,
};
use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DOWNLOAD_HOST: &str = "https://storage.minisocial.local";

#[derive(Clone, Debug)]
struct StoredBlob {
    data: Vec<u8>,
    download_token: String,
}

#[derive(Debug)]
pub struct MemoryBlobStore {
    bucket: String,
    chunk_size: NonZeroUsize,
    max_object_size: usize,
    objects: Arc<Mutex<HashMap<BlobPath, StoredBlob>>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new(bucket: String, chunk_size: NonZeroUsize, max_object_size: usize) -> Self {
        Self {
            bucket,
            chunk_size,
            max_object_size,
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Contents of a completed upload.
    #[must_use]
    pub fn read(&self, path: &BlobPath) -> Option<Vec<u8>> {
        lock(&self.objects).get(path).map(|blob| blob.data.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn upload(&self, path: BlobPath, data: Vec<u8>) -> UploadTask {
        let total_bytes = data.len();
        let (progress_sender, progress) = watch::channel(UploadProgress {
            bytes_transferred: 0,
            total_bytes,
        });
        let cancel = CancellationToken::new();

        let objects = Arc::clone(&self.objects);
        let chunk_size = self.chunk_size.get();
        let limit = self.max_object_size;
        let cancelled = cancel.clone();

        let handle = tokio::spawn(async move {
            if total_bytes > limit {
                return Err(BackendError::ObjectTooLarge { limit });
            }

            let mut staged = Vec::with_capacity(total_bytes);
            for chunk in data.chunks(chunk_size) {
                tokio::task::yield_now().await;
                if cancelled.is_cancelled() {
                    debug!(%path, transferred = staged.len(), "Upload cancelled");
                    return Err(BackendError::UploadCancelled);
                }

                staged.extend_from_slice(chunk);
                progress_sender.send_replace(UploadProgress {
                    bytes_transferred: staged.len(),
                    total_bytes,
                });
            }

            let download_token = BASE64_URL_SAFE_NO_PAD.encode(rand::random::<[u8; 18]>());
            lock(&objects).insert(
                path.clone(),
                StoredBlob {
                    data: staged,
                    download_token,
                },
            );
            debug!(%path, bytes = total_bytes, "Stored blob");

            Ok(path)
        });

        UploadTask::new(progress, cancel, handle)
    }

    async fn download_url(&self, path: &BlobPath) -> Result<String> {
        let token = lock(&self.objects)
            .get(path)
            .map(|blob| blob.download_token.clone())
            .ok_or_else(|| BackendError::BlobNotFound(path.clone()))?;

        Ok(format!(
            "{DOWNLOAD_HOST}/v0/b/{}/o/{}?alt=media&token={token}",
            self.bucket,
            path.get().replace('/', "%2F"),
        ))
    }

    async fn delete(&self, path: &BlobPath) -> Result<()> {
        lock(&self.objects)
            .remove(path)
            .map(|_| debug!(%path, "Deleted blob"))
            .ok_or_else(|| BackendError::BlobNotFound(path.clone()))
    }
}
