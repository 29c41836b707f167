//! In-process backend: every service keeps its state behind a mutex or a
//! watch channel, so each mutation is atomic and live queries see whole
//! states only.

mod auth;
mod blob;
mod posts;

pub use auth::MemoryAuthProvider;
pub use blob::MemoryBlobStore;
pub use posts::MemoryPostStore;

use crate::Backend;
use minisocial_common::{
    model::auth::FederatedAccount,
    snowflake::{ProcessId, WorkerId},
};
use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

const POSTS_WORKER_ID: u8 = 1;
const AUTH_WORKER_ID: u8 = 2;

pub const DEFAULT_BUCKET: &str = "minisocial.appspot.com";
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 256 * 1024;
pub const DEFAULT_MAX_OBJECT_SIZE: usize = 10 * 1024 * 1024;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MemoryBackendConfig {
    pub bucket: String,
    pub upload_chunk_size: NonZeroUsize,
    pub max_object_size: usize,
    /// Account the federated sign-in popup answers with; `None` behaves like a
    /// user closing the popup.
    pub popup_account: Option<FederatedAccount>,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_owned(),
            upload_chunk_size: NonZeroUsize::new(DEFAULT_UPLOAD_CHUNK_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            popup_account: None,
        }
    }
}

/// Concrete handles, for callers that need the in-memory extras such as
/// simulated outages.
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    pub posts: Arc<MemoryPostStore>,
    pub auth: Arc<MemoryAuthProvider>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(config: MemoryBackendConfig) -> Self {
        let process_id = ProcessId::default();

        Self {
            posts: Arc::new(MemoryPostStore::new(
                WorkerId::new(POSTS_WORKER_ID).unwrap_or_default(),
                process_id,
            )),
            auth: Arc::new(MemoryAuthProvider::new(
                WorkerId::new(AUTH_WORKER_ID).unwrap_or_default(),
                process_id,
                config.popup_account,
            )),
            blobs: Arc::new(MemoryBlobStore::new(
                config.bucket,
                config.upload_chunk_size,
                config.max_object_size,
            )),
        }
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        Backend {
            posts: self.posts.clone(),
            auth: self.auth.clone(),
            blobs: self.blobs.clone(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
