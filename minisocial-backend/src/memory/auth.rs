use crate::{BackendError, Result, auth::AuthProvider, memory::lock};
use async_trait::async_trait;
use minisocial_common::{
    model::{
        MinisocialSnowflakeGenerator,
        auth::{Credentials, FederatedAccount, FederatedProvider, PasswordDigest},
        user::{Email, Identity},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::{collections::HashMap, sync::Mutex};
use tokio::{sync::watch, task};
use tracing::{info, warn};

#[derive(Clone, Debug)]
struct Account {
    identity: Identity,
    /// `None` for accounts created through a federated popup.
    digest: Option<PasswordDigest>,
}

#[derive(Debug)]
pub struct MemoryAuthProvider {
    accounts: Mutex<HashMap<Email, Account>>,
    popup_account: Mutex<Option<FederatedAccount>>,
    current: watch::Sender<Option<Identity>>,
    ids: Mutex<MinisocialSnowflakeGenerator>,
}

impl MemoryAuthProvider {
    #[must_use]
    pub fn new(
        worker_id: WorkerId,
        process_id: ProcessId,
        popup_account: Option<FederatedAccount>,
    ) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            popup_account: Mutex::new(popup_account),
            current: watch::Sender::new(None),
            ids: Mutex::new(MinisocialSnowflakeGenerator::new(worker_id, process_id)),
        }
    }

    /// Changes what the next federated popup answers with.
    pub fn set_popup_account(&self, account: Option<FederatedAccount>) {
        *lock(&self.popup_account) = account;
    }

    fn next_user_id(&self) -> Result<u64> {
        Ok(lock(&self.ids).generate()?.get())
    }

    fn publish(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in_with_email(&self, credentials: &Credentials) -> Result<Identity> {
        let account = lock(&self.accounts).get(&credentials.email).cloned();
        let Some(Account {
            identity,
            digest: Some(digest),
        }) = account
        else {
            warn!(email = %credentials.email, "Sign-in for unknown email/password account");
            return Err(BackendError::InvalidCredentials);
        };

        let password = credentials.password.clone();
        let verified = task::spawn_blocking(move || digest.verify(&password)).await??;
        if !verified {
            warn!(user = %identity.id, "Sign-in with wrong password");
            return Err(BackendError::InvalidCredentials);
        }

        info!(user = %identity.id, "Signed in with email");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn register_with_email(&self, credentials: &Credentials) -> Result<Identity> {
        if lock(&self.accounts).contains_key(&credentials.email) {
            return Err(BackendError::EmailAlreadyInUse);
        }

        let password = credentials.password.clone();
        let digest = task::spawn_blocking(move || PasswordDigest::compute(&password)).await??;

        let identity = {
            let mut accounts = lock(&self.accounts);
            // Another registration may have won while hashing.
            if accounts.contains_key(&credentials.email) {
                return Err(BackendError::EmailAlreadyInUse);
            }

            let identity = Identity {
                id: self.next_user_id()?.into(),
                display_name: None,
                email: credentials.email.clone(),
            };
            accounts.insert(
                credentials.email.clone(),
                Account {
                    identity: identity.clone(),
                    digest: Some(digest),
                },
            );
            identity
        };

        info!(user = %identity.id, "Registered email account");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_popup(&self, provider: FederatedProvider) -> Result<Identity> {
        let federated = lock(&self.popup_account)
            .clone()
            .ok_or(BackendError::PopupClosed)?;

        let identity = {
            let mut accounts = lock(&self.accounts);
            if let Some(existing) = accounts.get(&federated.email) {
                existing.identity.clone()
            } else {
                let identity = Identity {
                    id: self.next_user_id()?.into(),
                    display_name: federated.display_name.clone(),
                    email: federated.email.clone(),
                };
                accounts.insert(
                    federated.email,
                    Account {
                        identity: identity.clone(),
                        digest: None,
                    },
                );
                identity
            }
        };

        info!(user = %identity.id, ?provider, "Signed in through popup");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(identity) = self.current.borrow().as_ref() {
            info!(user = %identity.id, "Signed out");
        }
        self.publish(None);
        Ok(())
    }

    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use crate::{BackendError, auth::AuthProvider, memory::MemoryAuthProvider};
    use minisocial_common::{
        model::{
            auth::{Credentials, FederatedAccount, FederatedProvider, Password},
            user::{DisplayName, Email},
        },
        snowflake::{ProcessId, WorkerId},
    };

    fn provider() -> MemoryAuthProvider {
        MemoryAuthProvider::new(WorkerId::default(), ProcessId::default(), None)
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: Email::new(email.to_owned()).unwrap(),
            password: Password::new(password.to_owned()).unwrap(),
        }
    }

    #[tokio::test]
    async fn register_then_sign_in() {
        let auth = provider();
        let changes = auth.identity_changes();
        assert_eq!(*changes.borrow(), None);

        let registered = auth
            .register_with_email(&credentials("ada@example.com", "hunter22"))
            .await
            .unwrap();
        assert_eq!(registered.display_name, None);
        assert_eq!(changes.borrow().as_ref(), Some(&registered));

        auth.sign_out().await.unwrap();
        assert_eq!(*changes.borrow(), None);

        let signed_in = auth
            .sign_in_with_email(&credentials("ADA@example.com", "hunter22"))
            .await
            .unwrap();
        assert_eq!(signed_in, registered);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email() {
        let auth = provider();
        auth.register_with_email(&credentials("ada@example.com", "hunter22"))
            .await
            .unwrap();
        auth.sign_out().await.unwrap();

        assert!(matches!(
            auth.sign_in_with_email(&credentials("ada@example.com", "hunter23"))
                .await,
            Err(BackendError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.sign_in_with_email(&credentials("bob@example.com", "hunter22"))
                .await,
            Err(BackendError::InvalidCredentials)
        ));
        assert_eq!(*auth.identity_changes().borrow(), None);
    }

    #[tokio::test]
    async fn duplicate_registration() {
        let auth = provider();
        auth.register_with_email(&credentials("ada@example.com", "hunter22"))
            .await
            .unwrap();

        assert!(matches!(
            auth.register_with_email(&credentials("ada@example.com", "other-pw"))
                .await,
            Err(BackendError::EmailAlreadyInUse)
        ));
    }

    #[tokio::test]
    async fn popup_sign_in() {
        let auth = provider();
        assert!(matches!(
            auth.sign_in_with_popup(FederatedProvider::Google).await,
            Err(BackendError::PopupClosed)
        ));

        auth.set_popup_account(Some(FederatedAccount {
            email: Email::new("carol@example.com".to_owned()).unwrap(),
            display_name: Some(DisplayName::new("Carol".to_owned()).unwrap()),
        }));
        let first = auth
            .sign_in_with_popup(FederatedProvider::Google)
            .await
            .unwrap();
        let second = auth
            .sign_in_with_popup(FederatedProvider::Google)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.greeting_name(), "Carol");

        // Popup-only accounts have no password to sign in with.
        assert!(matches!(
            auth.sign_in_with_email(&credentials("carol@example.com", "whatever"))
                .await,
            Err(BackendError::InvalidCredentials)
        ));
    }
}
