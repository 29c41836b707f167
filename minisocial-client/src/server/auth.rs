use crate::{server::ServerError, session::SessionHolder};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use minisocial_common::model::user::Identity;
use std::{convert::Infallible, sync::Arc};

/// The identity at the time the request arrived, if any.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CurrentSession(pub Option<Identity>);

impl CurrentSession {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    Arc<SessionHolder>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Arc::<SessionHolder>::from_ref(state).current()))
    }
}

/// Rejects with 401 while signed out.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SignedIn(pub Identity);

impl<S> FromRequestParts<S> for SignedIn
where
    Arc<SessionHolder>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(identity) = CurrentSession::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        identity.map(Self).ok_or(ServerError::NotSignedIn)
    }
}
