//! Image upload followed by post document creation.

use minisocial_backend::{
    Backend, BackendError,
    blob::{BlobPath, UploadProgress},
};
use minisocial_common::{
    model::{
        MinisocialSnowflakeGenerator,
        post::{NewPost, Post, PostId},
        user::Identity,
    },
    snowflake::{ProcessId, WorkerId},
};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

const UPLOAD_WORKER_ID: u8 = 3;

/// `Idle → Uploading → (Uploaded → DocumentCreated) | UploadFailed |
/// DocumentCreateFailed`
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CreatePostState {
    #[default]
    Idle,
    Uploading {
        progress: UploadProgress,
    },
    Uploaded {
        image_url: String,
    },
    DocumentCreated {
        post: PostId,
    },
    UploadFailed {
        error: String,
    },
    DocumentCreateFailed {
        error: String,
    },
}

impl CreatePostState {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            CreatePostState::Uploading { .. } | CreatePostState::Uploaded { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum CreatePostError {
    #[error("Please provide all required fields")]
    MissingFields,
    #[error("Failed to upload image")]
    Upload(#[source] BackendError),
    #[error("Failed to create post")]
    CreateDocument(#[source] BackendError),
}

/// The file picked in the create-post form.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SelectedImage {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct CreatePostFlow {
    backend: Backend,
    state: watch::Sender<CreatePostState>,
    uploads: Mutex<MinisocialSnowflakeGenerator>,
}

impl CreatePostFlow {
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            state: watch::Sender::new(CreatePostState::Idle),
            uploads: Mutex::new(MinisocialSnowflakeGenerator::new(
                WorkerId::new(UPLOAD_WORKER_ID).unwrap_or_default(),
                ProcessId::default(),
            )),
        }
    }

    #[must_use]
    pub fn state(&self) -> CreatePostState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CreatePostState> {
        self.state.subscribe()
    }

    /// Uploads the image to a fresh `posts/{user}/{upload}-{file name}` path
    /// and creates the post pointing at it. If the document cannot be created
    /// the image uploaded by this call is deleted again.
    pub async fn submit(
        &self,
        session: Option<&Identity>,
        image: Option<SelectedImage>,
    ) -> Result<Post, CreatePostError> {
        let (Some(identity), Some(image)) = (session, image) else {
            return Err(CreatePostError::MissingFields);
        };

        let path = match self.image_path(identity, &image.file_name) {
            Ok(path) => path,
            Err(err) => return Err(self.upload_failed(err)),
        };
        let stored = self
            .upload(path, image.data)
            .await
            .map_err(|err| self.upload_failed(err))?;
        let image_url = self
            .backend
            .blobs
            .download_url(&stored)
            .await
            .map_err(|err| self.upload_failed(err))?;
        self.state.send_replace(CreatePostState::Uploaded {
            image_url: image_url.clone(),
        });

        let new_post = NewPost {
            user_id: identity.id,
            username: identity.author_name(),
            image_url,
        };
        match self.backend.posts.create_post(new_post).await {
            Ok(post) => {
                info!(post = %post.id, user = %identity.id, "Created post");
                self.state
                    .send_replace(CreatePostState::DocumentCreated { post: post.id });
                Ok(post)
            }
            Err(err) => {
                error!(error = %err, "Error creating post");
                if let Err(cleanup) = self.backend.blobs.delete(&stored).await {
                    warn!(path = %stored, error = %cleanup, "Could not delete orphaned image");
                }
                let err = CreatePostError::CreateDocument(err);
                self.state.send_replace(CreatePostState::DocumentCreateFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn image_path(&self, identity: &Identity, file_name: &str) -> Result<BlobPath, BackendError> {
        let upload = self
            .uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(BlobPath::post_image(identity.id, upload.get(), file_name)?)
    }

    /// Runs the upload, mirroring its progress into the flow state.
    async fn upload(&self, path: BlobPath, data: Vec<u8>) -> Result<BlobPath, BackendError> {
        let task = self.backend.blobs.upload(path, data);
        let mut progress = task.progress();
        self.state.send_replace(CreatePostState::Uploading {
            progress: *progress.borrow_and_update(),
        });

        let finish = task.finish();
        tokio::pin!(finish);
        loop {
            tokio::select! {
                result = &mut finish => return result,
                changed = progress.changed() => {
                    if changed.is_err() {
                        return (&mut finish).await;
                    }
                    let progress = *progress.borrow_and_update();
                    self.state.send_replace(CreatePostState::Uploading { progress });
                }
            }
        }
    }

    fn upload_failed(&self, err: BackendError) -> CreatePostError {
        error!(error = %err, "Upload error");
        let err = CreatePostError::Upload(err);
        self.state.send_replace(CreatePostState::UploadFailed {
            error: err.to_string(),
        });
        err
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        create_post::{CreatePostError, CreatePostFlow, CreatePostState, SelectedImage},
        feed::FeedActions,
    };
    use minisocial_backend::{
        BackendError,
        blob::BlobPath,
        memory::{MemoryBackend, MemoryBackendConfig},
        posts::{PostFilter, PostQuery, PostStore},
    };
    use minisocial_common::model::user::{Email, Identity};
    use std::num::NonZeroUsize;

    fn identity(id: u64) -> Identity {
        Identity {
            id: id.into(),
            display_name: None,
            email: Email::new(format!("user{id}@example.com")).unwrap(),
        }
    }

    fn cat() -> SelectedImage {
        SelectedImage {
            file_name: "cat.png".to_owned(),
            data: vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4, 5, 6],
        }
    }

    /// The object path a download URL points at.
    fn stored_path(image_url: &str) -> BlobPath {
        let object = image_url
            .split("/o/")
            .nth(1)
            .and_then(|rest| rest.split('?').next())
            .unwrap();
        BlobPath::new(object.replace("%2F", "/")).unwrap()
    }

    fn backend() -> MemoryBackend {
        MemoryBackend::new(MemoryBackendConfig {
            upload_chunk_size: NonZeroUsize::new(3).unwrap(),
            max_object_size: 64,
            ..MemoryBackendConfig::default()
        })
    }

    #[tokio::test]
    async fn create_like_unlike() {
        let backend = backend();
        let flow = CreatePostFlow::new(backend.backend());
        let u1 = identity(1);
        let u2 = identity(2);

        let post = flow.submit(Some(&u1), Some(cat())).await.unwrap();
        assert_eq!(post.user_id, u1.id);
        assert_eq!(post.username.get(), "Anonymous");
        assert_eq!(post.likes, 0);
        assert!(post.liked_by.is_empty());
        assert!(post.comments.is_empty());
        assert_eq!(
            flow.state(),
            CreatePostState::DocumentCreated { post: post.id }
        );

        let path = stored_path(&post.image_url);
        assert!(path.get().starts_with("posts/1/"));
        assert!(path.get().ends_with("-cat.png"));
        assert_eq!(backend.blobs.read(&path), Some(cat().data));

        let actions = FeedActions::new(backend.posts.clone());
        let liked = actions.toggle_like(Some(&u2), post.id).await.unwrap();
        assert_eq!((liked.likes, liked.liked_by.clone()), (1, vec![u2.id]));

        let unliked = actions.toggle_like(Some(&u2), post.id).await.unwrap();
        assert_eq!(unliked.likes, 0);
        assert!(unliked.liked_by.is_empty());
    }

    #[tokio::test]
    async fn same_file_name_keeps_both_images() {
        let backend = backend();
        let flow = CreatePostFlow::new(backend.backend());
        let u1 = identity(1);

        let first = flow.submit(Some(&u1), Some(cat())).await.unwrap();
        let mut other_cat = cat();
        other_cat.data.reverse();
        let second = flow.submit(Some(&u1), Some(other_cat.clone())).await.unwrap();

        let first_path = stored_path(&first.image_url);
        let second_path = stored_path(&second.image_url);
        assert_ne!(first_path, second_path);
        assert_eq!(backend.blobs.len(), 2);
        assert_eq!(backend.blobs.read(&first_path), Some(cat().data));
        assert_eq!(backend.blobs.read(&second_path), Some(other_cat.data));
    }

    #[tokio::test]
    async fn failed_resubmission_keeps_earlier_image() {
        let backend = backend();
        let flow = CreatePostFlow::new(backend.backend());
        let u1 = identity(1);

        let first = flow.submit(Some(&u1), Some(cat())).await.unwrap();
        let first_path = stored_path(&first.image_url);

        backend.posts.set_available(false);
        let err = flow.submit(Some(&u1), Some(cat())).await.unwrap_err();
        assert!(matches!(err, CreatePostError::CreateDocument(_)));
        backend.posts.set_available(true);

        assert_eq!(backend.blobs.len(), 1);
        assert_eq!(backend.blobs.read(&first_path), Some(cat().data));
        let still_there = backend.posts.fetch_post(first.id).await.unwrap().unwrap();
        assert_eq!(still_there.image_url, first.image_url);
    }

    #[tokio::test]
    async fn missing_fields() {
        let flow = CreatePostFlow::new(backend().backend());

        assert!(matches!(
            flow.submit(None, Some(cat())).await,
            Err(CreatePostError::MissingFields)
        ));
        let err = flow.submit(Some(&identity(1)), None).await.unwrap_err();
        assert_eq!(err.to_string(), "Please provide all required fields");
        assert_eq!(flow.state(), CreatePostState::Idle);
    }

    #[tokio::test]
    async fn upload_failure() {
        let backend = backend();
        let flow = CreatePostFlow::new(backend.backend());
        let huge = SelectedImage {
            file_name: "huge.png".to_owned(),
            data: vec![0; 65],
        };

        let err = flow.submit(Some(&identity(1)), Some(huge)).await.unwrap_err();
        assert!(matches!(
            err,
            CreatePostError::Upload(BackendError::ObjectTooLarge { .. })
        ));
        assert_eq!(
            flow.state(),
            CreatePostState::UploadFailed {
                error: "Failed to upload image".to_owned()
            }
        );
        assert!(backend.blobs.is_empty());
    }

    #[tokio::test]
    async fn document_failure_removes_uploaded_image() {
        let backend = backend();
        backend.posts.set_available(false);
        let flow = CreatePostFlow::new(backend.backend());

        let err = flow.submit(Some(&identity(1)), Some(cat())).await.unwrap_err();
        assert!(matches!(err, CreatePostError::CreateDocument(_)));
        assert_eq!(
            flow.state(),
            CreatePostState::DocumentCreateFailed {
                error: "Failed to create post".to_owned()
            }
        );
        assert!(backend.blobs.is_empty());

        backend.posts.set_available(true);
        let page = backend
            .posts
            .query_posts(&PostQuery::new(PostFilter::All))
            .await
            .unwrap();
        assert!(page.posts.is_empty());
    }

    #[tokio::test]
    async fn progress_is_reported() {
        let backend = backend();
        let flow = CreatePostFlow::new(backend.backend());
        let mut states = flow.subscribe();

        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                let done = !state.is_busy();
                seen.push(state);
                if done {
                    break;
                }
            }
            seen
        });

        flow.submit(Some(&identity(1)), Some(cat())).await.unwrap();
        let seen = watcher.await.unwrap();

        assert!(
            seen.iter()
                .any(|state| matches!(state, CreatePostState::Uploading { .. }))
        );
        assert!(matches!(
            seen.last(),
            Some(CreatePostState::DocumentCreated { .. })
        ));
    }
}
