use crate::create_post::{CreatePostState, SelectedImage};
use base64::{Engine, prelude::BASE64_STANDARD};
use minisocial_backend::blob::UploadProgress;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("The selected image is not valid base64: {0}")]
pub struct InvalidImageError(#[from] base64::DecodeError);

/// Submitted form. The image travels as standard base64.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct CreatePostForm {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl CreatePostForm {
    /// `None` if no file was picked.
    pub fn selected_image(&self) -> Result<Option<SelectedImage>, InvalidImageError> {
        let (Some(file_name), Some(image)) = (&self.file_name, &self.image) else {
            return Ok(None);
        };
        if file_name.trim().is_empty() || image.is_empty() {
            return Ok(None);
        }

        Ok(Some(SelectedImage {
            file_name: file_name.clone(),
            data: BASE64_STANDARD.decode(image)?,
        }))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct CreatePostView {
    pub title: &'static str,
    /// Disables the submit button.
    pub uploading: bool,
    pub progress: Option<UploadProgress>,
    pub error: Option<String>,
    pub state: CreatePostState,
}

impl CreatePostView {
    pub const TITLE: &'static str = "Create Post";

    #[must_use]
    pub fn new(state: CreatePostState) -> Self {
        let progress = match &state {
            CreatePostState::Uploading { progress } => Some(*progress),
            _ => None,
        };
        let error = match &state {
            CreatePostState::UploadFailed { error }
            | CreatePostState::DocumentCreateFailed { error } => Some(error.clone()),
            _ => None,
        };

        Self {
            title: Self::TITLE,
            uploading: state.is_busy(),
            progress,
            error,
            state,
        }
    }
}
