use minisocial_backend::memory::{
    DEFAULT_BUCKET, DEFAULT_MAX_OBJECT_SIZE, DEFAULT_UPLOAD_CHUNK_SIZE, MemoryBackendConfig,
};
use minisocial_common::model::{
    ModelValidationError,
    auth::FederatedAccount,
    user::{DisplayName, Email},
};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroUsize,
};

pub const DEFAULT_FEED_PAGE_SIZE: usize = 20;

/// Process environment, read through `envy` after `.env` has been loaded.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,
    #[serde(default = "default_upload_chunk_size")]
    pub upload_chunk_size: NonZeroUsize,
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: NonZeroUsize,
    /// Account the in-memory sign-in popup answers with.
    pub federated_email: Option<String>,
    pub federated_display_name: Option<String>,
}

fn default_storage_bucket() -> String {
    DEFAULT_BUCKET.to_owned()
}

fn default_upload_chunk_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_UPLOAD_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN)
}

fn default_max_upload_size() -> usize {
    DEFAULT_MAX_OBJECT_SIZE
}

fn default_feed_page_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_FEED_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN)
}

impl Env {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    pub fn memory_backend_config(&self) -> Result<MemoryBackendConfig, ModelValidationError> {
        let popup_account = self
            .federated_email
            .clone()
            .map(|email| -> Result<_, ModelValidationError> {
                Ok(FederatedAccount {
                    email: Email::new(email)?,
                    display_name: self
                        .federated_display_name
                        .clone()
                        .map(DisplayName::new)
                        .transpose()?,
                })
            })
            .transpose()?;

        Ok(MemoryBackendConfig {
            bucket: self.storage_bucket.clone(),
            upload_chunk_size: self.upload_chunk_size,
            max_object_size: self.max_upload_size,
            popup_account,
        })
    }
}
