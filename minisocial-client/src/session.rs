use minisocial_backend::{BackendError, auth::AuthProvider};
use minisocial_common::model::user::Identity;
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error};

/// The current identity, kept in step with the auth provider's change
/// notifications for as long as the holder lives.
pub struct SessionHolder {
    auth: Arc<dyn AuthProvider>,
    current: watch::Sender<Option<Identity>>,
    forwarder: JoinHandle<()>,
}

impl SessionHolder {
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(auth: Arc<dyn AuthProvider>) -> Self {
        let mut changes = auth.identity_changes();
        let current = watch::Sender::new(changes.borrow_and_update().clone());

        let sender = current.clone();
        let forwarder = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let identity = changes.borrow_and_update().clone();
                debug!(user = ?identity.as_ref().map(|identity| identity.id), "Session changed");
                sender.send_replace(identity);
            }
        });

        Self {
            auth,
            current,
            forwarder,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Consumers re-render whenever this receiver changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    /// Clears the local identity right away, then asks the provider to sign
    /// out. Failures are logged and returned; there is no retry.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.current.send_replace(None);

        self.auth
            .sign_out()
            .await
            .inspect_err(|err| error!(error = %err, "Sign-out failed"))
    }
}

impl Drop for SessionHolder {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

impl Debug for SessionHolder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHolder")
            .field("current", &*self.current.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::session::SessionHolder;
    use async_trait::async_trait;
    use minisocial_backend::{
        BackendError, Result,
        auth::AuthProvider,
        memory::MemoryBackend,
    };
    use minisocial_common::model::{
        auth::{Credentials, FederatedProvider, Password},
        user::{Email, Identity},
    };
    use std::sync::Arc;
    use tokio::sync::watch;

    fn credentials() -> Credentials {
        Credentials {
            email: Email::new("ada@example.com".to_owned()).unwrap(),
            password: Password::new("hunter22".to_owned()).unwrap(),
        }
    }

    #[tokio::test]
    async fn follows_provider_notifications() {
        let backend = MemoryBackend::default();
        let session = SessionHolder::start(backend.auth.clone());
        let mut changes = session.subscribe();
        assert_eq!(session.current(), None);

        let identity = backend
            .auth
            .register_with_email(&credentials())
            .await
            .unwrap();
        changes.changed().await.unwrap();
        assert_eq!(session.current(), Some(identity));

        backend.auth.sign_out().await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(session.current(), None);
    }

    #[tokio::test]
    async fn starts_with_existing_identity() {
        let backend = MemoryBackend::default();
        let identity = backend
            .auth
            .register_with_email(&credentials())
            .await
            .unwrap();

        let session = SessionHolder::start(backend.auth.clone());
        assert_eq!(session.current(), Some(identity));
    }

    /// Never confirms a sign-out.
    struct StuckAuth {
        current: watch::Sender<Option<Identity>>,
    }

    #[async_trait]
    impl AuthProvider for StuckAuth {
        async fn sign_in_with_email(&self, _: &Credentials) -> Result<Identity> {
            Err(BackendError::Unavailable)
        }

        async fn register_with_email(&self, _: &Credentials) -> Result<Identity> {
            Err(BackendError::Unavailable)
        }

        async fn sign_in_with_popup(&self, _: FederatedProvider) -> Result<Identity> {
            Err(BackendError::Unavailable)
        }

        async fn sign_out(&self) -> Result<()> {
            Err(BackendError::Unavailable)
        }

        fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
            self.current.subscribe()
        }
    }

    #[tokio::test]
    async fn sign_out_clears_before_provider_answers() {
        let identity = Identity {
            id: 1.into(),
            display_name: None,
            email: Email::new("ada@example.com".to_owned()).unwrap(),
        };
        let auth = Arc::new(StuckAuth {
            current: watch::Sender::new(Some(identity.clone())),
        });
        let session = SessionHolder::start(auth);
        assert_eq!(session.current(), Some(identity));

        assert!(matches!(
            session.sign_out().await,
            Err(BackendError::Unavailable)
        ));
        assert_eq!(session.current(), None);
    }
}
