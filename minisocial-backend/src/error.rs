use crate::blob::{BlobPath, InvalidBlobPathError};
use minisocial_common::{
    model::{
        ModelValidationError,
        auth::PasswordHashError,
        post::{CommentId, PostId},
    },
    snowflake::SnowflakeTimestampError,
};
use thiserror::Error;

pub type Result<T, E = BackendError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("An object in the backend was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Post with id {0} was not found")]
    PostNotFound(PostId),
    #[error("Comment with id {comment} was not found on post {post}")]
    CommentNotFound { post: PostId, comment: CommentId },
    #[error("No blob stored at {0}")]
    BlobNotFound(BlobPath),
    #[error(transparent)]
    InvalidBlobPath(#[from] InvalidBlobPathError),
    #[error("Blob is larger than the maximum object size of {limit} bytes")]
    ObjectTooLarge { limit: usize },
    #[error("Upload was cancelled")]
    UploadCancelled,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email address is already in use")]
    EmailAlreadyInUse,
    #[error("The sign-in popup was closed before completing")]
    PopupClosed,
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Could not generate an id: {0}")]
    IdGeneration(#[from] SnowflakeTimestampError),
    #[error("The page token could not be decoded")]
    InvalidPageToken,
    #[error("The backend is unavailable")]
    Unavailable,
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BackendError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BackendError::PostNotFound(_)
                | BackendError::CommentNotFound { .. }
                | BackendError::BlobNotFound(_)
        )
    }
}
