use crate::Result;
use async_trait::async_trait;
use minisocial_common::model::{
    auth::{Credentials, FederatedProvider},
    user::Identity,
};
use tokio::sync::watch;

/// Hosted authentication. Every successful sign-in, registration or sign-out
/// is also published on [`AuthProvider::identity_changes`].
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_email(&self, credentials: &Credentials) -> Result<Identity>;

    /// Creates the account and signs it in.
    async fn register_with_email(&self, credentials: &Credentials) -> Result<Identity>;

    async fn sign_in_with_popup(&self, provider: FederatedProvider) -> Result<Identity>;

    async fn sign_out(&self) -> Result<()>;

    /// The receiver starts out holding the current identity.
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>>;
}
