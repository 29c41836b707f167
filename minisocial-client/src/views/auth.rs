//! Login and registration forms.

use minisocial_backend::{BackendError, auth::AuthProvider};
use minisocial_common::model::{
    ModelValidationError,
    auth::{Credentials, FederatedProvider, Password},
    user::{Email, Identity},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

/// Where a successful sign-in or registration navigates to.
pub const AFTER_SIGN_IN: &str = "/feeds";

#[derive(Debug, Error)]
pub enum AuthFormError {
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error(transparent)]
    Invalid(#[from] ModelValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn credentials(email: &str, password: &str) -> Result<Credentials, ModelValidationError> {
    Ok(Credentials {
        email: Email::new(email.to_owned())?,
        password: Password::new(password.to_owned())?,
    })
}

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterForm")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

pub async fn log_in(auth: &dyn AuthProvider, form: &LoginForm) -> Result<Identity, AuthFormError> {
    let credentials = credentials(&form.email, &form.password)
        .inspect_err(|err| error!(error = %err, "Error logging in"))?;

    auth.sign_in_with_email(&credentials)
        .await
        .inspect(|identity| info!(user = %identity.id, "Signed in"))
        .map_err(|err| {
            error!(error = %err, "Error logging in");
            err.into()
        })
}

/// A confirmation mismatch is rejected without contacting the provider.
pub async fn register(
    auth: &dyn AuthProvider,
    form: &RegisterForm,
) -> Result<Identity, AuthFormError> {
    if form.password != form.confirm_password {
        return Err(AuthFormError::PasswordMismatch);
    }

    let credentials = credentials(&form.email, &form.password)
        .inspect_err(|err| error!(error = %err, "Error registering"))?;

    auth.register_with_email(&credentials)
        .await
        .inspect(|identity| info!(user = %identity.id, "Registered"))
        .map_err(|err| {
            error!(error = %err, "Error registering");
            err.into()
        })
}

/// Federated sign-in; also used to register, since the provider creates the
/// account on first use.
pub async fn popup(
    auth: &dyn AuthProvider,
    provider: FederatedProvider,
) -> Result<Identity, AuthFormError> {
    auth.sign_in_with_popup(provider)
        .await
        .inspect(|identity| info!(user = %identity.id, ?provider, "Signed in with popup"))
        .map_err(|err| {
            error!(error = %err, ?provider, "Error signing in with popup");
            err.into()
        })
}
