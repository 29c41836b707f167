use crate::{BackendError, Result};
use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use minisocial_common::model::{
    post::{CommentId, NewComment, NewPost, Post, PostId, Reply},
    user::UserId,
};
use std::{
    fmt::{Debug, Formatter},
    num::NonZeroUsize,
};

/// Which posts a query or subscription selects.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum PostFilter {
    #[default]
    All,
    /// Equality on the owning user id.
    ByAuthor(UserId),
    /// Membership in the saving set.
    SavedBy(UserId),
}

impl PostFilter {
    #[must_use]
    pub fn matches(self, post: &Post) -> bool {
        match self {
            PostFilter::All => true,
            PostFilter::ByAuthor(user) => post.is_owned_by(user),
            PostFilter::SavedBy(user) => post.is_saved_by(user),
        }
    }
}

/// Opaque continuation token handed out with a page of results.
#[derive(Clone, Eq, PartialEq, Debug, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    #[must_use]
    pub fn after(post: PostId) -> Self {
        Self(BASE64_URL_SAFE_NO_PAD.encode(u64::from(post).to_be_bytes()))
    }

    #[must_use]
    pub fn from_raw(token: String) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    /// The id of the last post of the previous page.
    pub fn last_post(&self) -> Result<PostId> {
        let bytes: [u8; 8] = BASE64_URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|_| BackendError::InvalidPageToken)?
            .try_into()
            .map_err(|_| BackendError::InvalidPageToken)?;

        Ok(u64::from_be_bytes(bytes).into())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostQuery {
    pub filter: PostFilter,
    pub limit: Option<NonZeroUsize>,
    pub page_token: Option<PageToken>,
}

impl PostQuery {
    #[must_use]
    pub fn new(filter: PostFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: NonZeroUsize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn page_token(mut self, page_token: Option<PageToken>) -> Self {
        self.page_token = page_token;
        self
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub next_page_token: Option<PageToken>,
}

/// User-id sets kept on a post.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum MemberSet {
    /// Also drives the like counter.
    LikedBy,
    SavedBy,
}

/// A single atomic mutation of one post document.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostUpdate {
    /// Array-union: no-op if the user is already a member.
    AddMember { set: MemberSet, user: UserId },
    /// Array-remove: no-op if the user is not a member.
    RemoveMember { set: MemberSet, user: UserId },
    /// Adds the user if absent, removes them otherwise.
    ToggleMember { set: MemberSet, user: UserId },
    AppendComment(NewComment),
    AppendReply { comment: CommentId, reply: Reply },
}

/// A standing query that yields the full matching result set whenever it
/// changes. Dropping it releases the registration.
pub struct PostSubscription(Box<dyn SnapshotSource>);

impl PostSubscription {
    #[must_use]
    pub fn new(source: impl SnapshotSource + 'static) -> Self {
        Self(Box::new(source))
    }

    /// Waits for the next snapshot. The first call yields the current result
    /// set; `None` means the store went away.
    pub async fn next_snapshot(&mut self) -> Option<Result<Vec<Post>>> {
        self.0.next_snapshot().await
    }
}

impl Debug for PostSubscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PostSubscription").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait SnapshotSource: Send {
    async fn next_snapshot(&mut self) -> Option<Result<Vec<Post>>>;
}

/// The post collection. Results are ordered newest first.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<Post>;

    async fn fetch_post(&self, id: PostId) -> Result<Option<Post>>;

    async fn query_posts(&self, query: &PostQuery) -> Result<PostPage>;

    async fn subscribe_posts(&self, filter: PostFilter) -> Result<PostSubscription>;

    /// Applies the update atomically and returns the post as written.
    async fn update_post(&self, id: PostId, update: PostUpdate) -> Result<Post>;

    /// Fails with [`BackendError::PostNotFound`] if there is nothing to delete.
    async fn delete_post(&self, id: PostId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use crate::{BackendError, posts::PageToken};
    use minisocial_common::model::post::PostId;

    #[test]
    fn page_token_carries_post_id() {
        let post: PostId = 0xDEAD_BEEF_u64.into();
        assert_eq!(PageToken::after(post).last_post().unwrap(), post);
    }

    #[test]
    fn garbage_page_token() {
        assert!(matches!(
            PageToken::from_raw("not a token!".to_owned()).last_post(),
            Err(BackendError::InvalidPageToken)
        ));
        assert!(matches!(
            PageToken::from_raw("AAAA".to_owned()).last_post(),
            Err(BackendError::InvalidPageToken)
        ));
    }
}
