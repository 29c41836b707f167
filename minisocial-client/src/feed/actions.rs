use minisocial_backend::{
    BackendError,
    posts::{MemberSet, PostStore, PostUpdate},
};
use minisocial_common::model::{
    post::{CommentId, InvalidTextError, NewComment, Post, PostId, Reply, Text},
    user::Identity,
};
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};
use thiserror::Error;
use tracing::{info, warn};

/// User-initiated operations on a displayed post.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Action {
    LoadPosts,
    Like,
    Save,
    Comment,
    Reply,
    Delete,
}

impl Action {
    #[must_use]
    pub fn failure_message(self) -> &'static str {
        match self {
            Action::LoadPosts => "Failed to load posts",
            Action::Like => "Failed to like post",
            Action::Save => "Failed to save post",
            Action::Comment => "Failed to add comment",
            Action::Reply => "Failed to add reply",
            Action::Delete => "Failed to delete post",
        }
    }

    fn requirement(self) -> &'static str {
        match self {
            Action::LoadPosts => "view posts",
            Action::Like => "like posts",
            Action::Save => "save posts",
            Action::Comment => "comment",
            Action::Reply => "reply",
            Action::Delete => "delete posts",
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("You must be signed in to {}", .0.requirement())]
    SignInRequired(Action),
    #[error("Only the owner can delete this post")]
    NotOwner,
    #[error("Invalid text: {0}")]
    InvalidText(#[from] InvalidTextError),
    #[error("{}", .action.failure_message())]
    Backend {
        action: Action,
        #[source]
        source: BackendError,
    },
}

impl ActionError {
    #[must_use]
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            ActionError::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}

type Result<T, E = ActionError> = std::result::Result<T, E>;

fn signed_in(session: Option<&Identity>, action: Action) -> Result<&Identity> {
    session.ok_or(ActionError::SignInRequired(action))
}

/// Translates feed interactions into post store mutations. Every mutation is a
/// single atomic update on the store, so the result never depends on a stale
/// local copy.
#[derive(Clone)]
pub struct FeedActions {
    posts: Arc<dyn PostStore>,
}

impl FeedActions {
    #[must_use]
    pub fn new(posts: Arc<dyn PostStore>) -> Self {
        Self { posts }
    }

    async fn update(&self, action: Action, post: PostId, update: PostUpdate) -> Result<Post> {
        self.posts.update_post(post, update).await.map_err(|source| {
            warn!(%post, ?action, error = %source, "{}", action.failure_message());
            ActionError::Backend { action, source }
        })
    }

    /// Likes the post if the user has not liked it yet, unlikes it otherwise.
    pub async fn toggle_like(&self, session: Option<&Identity>, post: PostId) -> Result<Post> {
        let user = signed_in(session, Action::Like)?.id;
        let update = PostUpdate::ToggleMember {
            set: MemberSet::LikedBy,
            user,
        };
        self.update(Action::Like, post, update).await
    }

    /// Idempotent.
    pub async fn save(&self, session: Option<&Identity>, post: PostId) -> Result<Post> {
        let user = signed_in(session, Action::Save)?.id;
        let update = PostUpdate::AddMember {
            set: MemberSet::SavedBy,
            user,
        };
        self.update(Action::Save, post, update).await
    }

    pub async fn unsave(&self, session: Option<&Identity>, post: PostId) -> Result<Post> {
        let user = signed_in(session, Action::Save)?.id;
        let update = PostUpdate::RemoveMember {
            set: MemberSet::SavedBy,
            user,
        };
        self.update(Action::Save, post, update).await
    }

    pub async fn toggle_save(&self, session: Option<&Identity>, post: PostId) -> Result<Post> {
        let user = signed_in(session, Action::Save)?.id;
        let update = PostUpdate::ToggleMember {
            set: MemberSet::SavedBy,
            user,
        };
        self.update(Action::Save, post, update).await
    }

    pub async fn comment(
        &self,
        session: Option<&Identity>,
        post: PostId,
        text: &str,
    ) -> Result<Post> {
        let identity = signed_in(session, Action::Comment)?;
        let comment = NewComment {
            username: identity.author_name(),
            text: Text::new(text)?,
        };
        self.update(Action::Comment, post, PostUpdate::AppendComment(comment))
            .await
    }

    pub async fn reply(
        &self,
        session: Option<&Identity>,
        post: PostId,
        comment: CommentId,
        text: &str,
    ) -> Result<Post> {
        let identity = signed_in(session, Action::Reply)?;
        let reply = Reply {
            username: identity.author_name(),
            text: Text::new(text)?,
        };
        self.update(Action::Reply, post, PostUpdate::AppendReply { comment, reply })
            .await
    }

    /// `post` is the caller's displayed copy; ownership is checked against it
    /// before anything is sent.
    pub async fn delete(&self, session: Option<&Identity>, post: &Post) -> Result<()> {
        let identity = signed_in(session, Action::Delete)?;
        if !post.is_owned_by(identity.id) {
            return Err(ActionError::NotOwner);
        }

        self.posts.delete_post(post.id).await.map_err(|source| {
            warn!(post = %post.id, error = %source, "Failed to delete post");
            ActionError::Backend {
                action: Action::Delete,
                source,
            }
        })?;
        info!(post = %post.id, user = %identity.id, "Deleted post");
        Ok(())
    }
}

impl Debug for FeedActions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedActions").finish_non_exhaustive()
    }
}
