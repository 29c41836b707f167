//! The navigation shell: URL paths mapped to views, gated on the session.

use crate::{
    create_post::{CreatePostError, CreatePostFlow},
    feed::{ActionError, FeedActions, LiveFeed},
    session::SessionHolder,
    views::{auth::AuthFormError, create_post::InvalidImageError},
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use extract::Json;
use minisocial_backend::{Backend, BackendError, posts::PostFilter};
use minisocial_common::model::post::PostId;
use serde::Serialize;
use std::{num::NonZeroUsize, sync::Arc};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

mod auth;
mod extract;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub backend: Backend,
    pub session: Arc<SessionHolder>,
    pub feed: Arc<LiveFeed>,
    pub actions: FeedActions,
    pub create_post: Arc<CreatePostFlow>,
    pub page_size: NonZeroUsize,
}

impl ServerState {
    /// Starts the session holder and the live feed. Must be called from within
    /// a tokio runtime.
    #[must_use]
    pub fn new(backend: Backend, page_size: NonZeroUsize) -> Self {
        Self {
            session: Arc::new(SessionHolder::start(backend.auth.clone())),
            feed: Arc::new(LiveFeed::open(backend.posts.clone(), PostFilter::All)),
            actions: FeedActions::new(backend.posts.clone()),
            create_post: Arc::new(CreatePostFlow::new(backend.clone())),
            backend,
            page_size,
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The full application with tracing, ready to serve.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("You must be signed in")]
    NotSignedIn,
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(PostId),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    AuthForm(#[from] AuthFormError),
    #[error(transparent)]
    CreatePost(#[from] CreatePostError),
    #[error(transparent)]
    InvalidImage(#[from] InvalidImageError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn backend_status(err: &BackendError) -> StatusCode {
    match err {
        err if err.is_not_found() => StatusCode::NOT_FOUND,
        BackendError::InvalidCredentials | BackendError::PopupClosed => StatusCode::UNAUTHORIZED,
        BackendError::EmailAlreadyInUse => StatusCode::CONFLICT,
        BackendError::ObjectTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        BackendError::Data(_) | BackendError::InvalidBlobPath(_) | BackendError::InvalidPageToken => {
            StatusCode::BAD_REQUEST
        }
        BackendError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::NotSignedIn
            | ServerError::Action(ActionError::SignInRequired(_)) => StatusCode::UNAUTHORIZED,
            ServerError::Action(ActionError::NotOwner) => StatusCode::FORBIDDEN,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidImage(_)
            | ServerError::Action(ActionError::InvalidText(_))
            | ServerError::AuthForm(AuthFormError::PasswordMismatch | AuthFormError::Invalid(_))
            | ServerError::CreatePost(CreatePostError::MissingFields) => StatusCode::BAD_REQUEST,
            ServerError::Action(ActionError::Backend { source, .. })
            | ServerError::AuthForm(AuthFormError::Backend(source))
            | ServerError::CreatePost(
                CreatePostError::Upload(source) | CreatePostError::CreateDocument(source),
            )
            | ServerError::Backend(source) => backend_status(source),
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The text a view shows for this error. Authentication failures are
    /// answered with a bare status.
    pub fn message(&self) -> Option<String> {
        match self {
            ServerError::AuthForm(AuthFormError::Backend(_))
            | ServerError::Backend(_)
            | ServerError::JsonResponse(_) => None,
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::NotSignedIn
            | ServerError::PostByIdNotFound(_)
            | ServerError::Action(_)
            | ServerError::AuthForm(_)
            | ServerError::CreatePost(_)
            | ServerError::InvalidImage(_) => Some(self.to_string()),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            warn!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.message(),
        };
        (status, Json(error_response)).into_response()
    }
}
