use crate::{BackendError, Result};
use async_trait::async_trait;
use minisocial_common::model::user::UserId;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The blob path is invalid: {0:?}")]
pub struct InvalidBlobPathError(String);

/// Slash separated object path inside the bucket.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct BlobPath(String);

impl BlobPath {
    pub fn new(path: String) -> Result<Self, InvalidBlobPathError> {
        let valid = !path.is_empty()
            && path
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if valid {
            Ok(Self(path))
        } else {
            Err(InvalidBlobPathError(path))
        }
    }

    /// `posts/{user}/{upload}-{file name}`, keeping only the last component of
    /// `file_name`. `upload` keeps repeated uploads of one file name apart.
    pub fn post_image(
        user: UserId,
        upload: u64,
        file_name: &str,
    ) -> Result<Self, InvalidBlobPathError> {
        let base_name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name)
            .trim();
        if base_name.is_empty() || base_name == "." || base_name == ".." {
            return Err(InvalidBlobPathError(file_name.to_owned()));
        }

        Self::new(format!("posts/{user}/{upload}-{base_name}"))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for BlobPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
pub struct UploadProgress {
    pub bytes_transferred: usize,
    pub total_bytes: usize,
}

impl UploadProgress {
    #[must_use]
    pub fn is_complete(self) -> bool {
        self.bytes_transferred == self.total_bytes
    }
}

/// A running chunked upload.
#[derive(Debug)]
pub struct UploadTask {
    progress: watch::Receiver<UploadProgress>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<BlobPath>>,
}

impl UploadTask {
    #[must_use]
    pub fn new(
        progress: watch::Receiver<UploadProgress>,
        cancel: CancellationToken,
        handle: JoinHandle<Result<BlobPath>>,
    ) -> Self {
        Self {
            progress,
            cancel,
            handle,
        }
    }

    /// Observes the transferred byte count.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.clone()
    }

    /// Stops the upload before its next chunk; nothing is stored.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the upload to complete and returns the stored path.
    pub async fn finish(self) -> Result<BlobPath> {
        self.handle.await.map_err(BackendError::from)?
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Starts uploading `data` to `path`, replacing any existing object once
    /// the last chunk lands.
    fn upload(&self, path: BlobPath, data: Vec<u8>) -> UploadTask;

    async fn download_url(&self, path: &BlobPath) -> Result<String>;

    async fn delete(&self, path: &BlobPath) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use crate::blob::BlobPath;

    #[test]
    fn blob_paths() {
        assert!(BlobPath::new("posts/cat.png".to_owned()).is_ok());
        assert!(BlobPath::new(String::new()).is_err());
        assert!(BlobPath::new("posts//cat.png".to_owned()).is_err());
        assert!(BlobPath::new("posts/../secrets".to_owned()).is_err());
    }

    #[test]
    fn post_image_strips_directories() {
        assert_eq!(
            BlobPath::post_image(42.into(), 7, "C:\\Users\\ada\\cat.png")
                .unwrap()
                .get(),
            "posts/42/7-cat.png"
        );
        assert_eq!(
            BlobPath::post_image(42.into(), 7, "../cat.png")
                .unwrap()
                .get(),
            "posts/42/7-cat.png"
        );
        assert!(BlobPath::post_image(42.into(), 7, "..").is_err());
        assert!(BlobPath::post_image(42.into(), 7, "dir/").is_err());
    }
}
