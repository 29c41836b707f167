//! The managed backend the client talks to: a post document store with live
//! queries, an auth provider and a blob store. [`memory`] provides an
//! in-process implementation of all three.

pub mod auth;
pub mod blob;
pub mod error;
pub mod memory;
pub mod posts;
mod record;

use crate::{auth::AuthProvider, blob::BlobStore, posts::PostStore};
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

pub use error::{BackendError, Result};

/// Handles to the three backend services.
#[derive(Clone)]
pub struct Backend {
    pub posts: Arc<dyn PostStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Debug for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
