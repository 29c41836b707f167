use crate::model::user::{DisplayName, Email};
use argon2::{Argon2, Params};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use thiserror::Error;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_SALT_LEN: usize = 16;
pub const PASSWORD_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Password should be at least {PASSWORD_MIN_LEN} characters")]
pub struct WeakPasswordError;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Result<Self, WeakPasswordError> {
        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(WeakPasswordError);
        }

        Ok(Self(password))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Password {
    type Error = WeakPasswordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Credentials {
    pub email: Email,
    pub password: Password,
}

/// Popup sign-in providers the auth service federates with.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederatedProvider {
    #[default]
    Google,
}

/// Account returned by a federated provider's consent popup.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FederatedAccount {
    pub email: Email,
    pub display_name: Option<DisplayName>,
}

/// Salted argon2 digest of a password.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordDigest {
    salt: [u8; PASSWORD_SALT_LEN],
    hash: Box<[u8; PASSWORD_HASH_LEN]>,
}

impl PasswordDigest {
    pub fn compute(password: &Password) -> Result<Self, PasswordHashError> {
        Self::with_salt(password, rand::random())
    }

    fn with_salt(
        password: &Password,
        salt: [u8; PASSWORD_SALT_LEN],
    ) -> Result<Self, PasswordHashError> {
        let mut hash = Box::new([0; PASSWORD_HASH_LEN]);
        Argon2::default()
            .hash_password_into(password.get().as_bytes(), &salt, &mut *hash)
            .map_err(PasswordHashError)?;

        Ok(Self { salt, hash })
    }

    pub fn verify(&self, password: &Password) -> Result<bool, PasswordHashError> {
        let candidate = Self::with_salt(password, self.salt)?;
        Ok(candidate.hash == self.hash)
    }
}

impl Debug for PasswordDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordDigest")
            .field("salt", &"[redacted]")
            .field("hash", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::auth::{Password, PasswordDigest, WeakPasswordError};

    #[test]
    fn short_passwords_are_weak() {
        assert_eq!(Password::new("12345".to_owned()), Err(WeakPasswordError));
        assert!(Password::new("123456".to_owned()).is_ok());
    }

    #[test]
    fn digest_verifies_only_the_original() {
        let password = Password::new("hunter22".to_owned()).unwrap();
        let digest = PasswordDigest::compute(&password).unwrap();

        assert!(digest.verify(&password).unwrap());
        assert!(
            !digest
                .verify(&Password::new("hunter23".to_owned()).unwrap())
                .unwrap()
        );
    }

    #[test]
    fn password_is_redacted() {
        let password = Password::new("hunter22".to_owned()).unwrap();
        assert!(!format!("{password:?}").contains("hunter22"));
    }
}
