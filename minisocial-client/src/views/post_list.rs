use crate::{
    feed::Action,
    views::{LOADING_MESSAGE, feed::PostCard},
};
use minisocial_backend::{
    BackendError,
    posts::{PageToken, PostFilter, PostPage, PostQuery, PostStore},
};
use minisocial_common::model::user::Identity;
use serde::Serialize;
use std::{num::NonZeroUsize, sync::Arc};
use tracing::warn;

/// The per-user post listings.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ListKind {
    MyPosts,
    SavedPosts,
}

impl ListKind {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            ListKind::MyPosts => "My Posts",
            ListKind::SavedPosts => "Saved Posts",
        }
    }

    #[must_use]
    pub fn filter(self, user: &Identity) -> PostFilter {
        match self {
            ListKind::MyPosts => PostFilter::ByAuthor(user.id),
            ListKind::SavedPosts => PostFilter::SavedBy(user.id),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PostListState {
    pub title: &'static str,
    pub loading: bool,
    pub message: Option<&'static str>,
    pub error: Option<String>,
    pub posts: Vec<PostCard>,
    pub next_page_token: Option<PageToken>,
}

impl PostListState {
    fn loading(kind: ListKind) -> Self {
        Self {
            title: kind.title(),
            loading: true,
            message: Some(LOADING_MESSAGE),
            error: None,
            posts: Vec::new(),
            next_page_token: None,
        }
    }
}

/// One-shot, paged listing of the viewer's own or saved posts.
#[derive(Clone)]
pub struct PostListView {
    posts: Arc<dyn PostStore>,
    kind: ListKind,
    page_size: NonZeroUsize,
}

impl PostListView {
    #[must_use]
    pub fn new(posts: Arc<dyn PostStore>, kind: ListKind, page_size: NonZeroUsize) -> Self {
        Self {
            posts,
            kind,
            page_size,
        }
    }

    /// Fetches the first page. Without a session nothing is fetched and the
    /// list keeps loading.
    pub async fn load(&self, session: Option<&Identity>) -> PostListState {
        self.load_page(session, None).await
    }

    /// Appends the page after `state`'s last one. Without a session or a
    /// continuation token `state` is returned unchanged. A failed fetch only
    /// sets the error, so the listing can be continued later.
    pub async fn load_more(
        &self,
        session: Option<&Identity>,
        mut state: PostListState,
    ) -> PostListState {
        let (Some(viewer), Some(page_token)) = (session, state.next_page_token.clone()) else {
            return state;
        };

        match self.fetch(viewer, Some(page_token)).await {
            Ok(page) => {
                state.loading = false;
                state.message = None;
                state.error = None;
                state
                    .posts
                    .extend(PostCard::cards(page.posts, Some(viewer)));
                state.next_page_token = page.next_page_token;
            }
            Err(_) => state.error = Some(Action::LoadPosts.failure_message().to_owned()),
        }

        state
    }

    pub async fn load_page(
        &self,
        session: Option<&Identity>,
        page_token: Option<PageToken>,
    ) -> PostListState {
        let mut state = PostListState::loading(self.kind);
        let Some(viewer) = session else {
            return state;
        };

        match self.fetch(viewer, page_token).await {
            Ok(page) => {
                state.loading = false;
                state.message = None;
                state.posts = PostCard::cards(page.posts, Some(viewer));
                state.next_page_token = page.next_page_token;
            }
            Err(_) => state.error = Some(Action::LoadPosts.failure_message().to_owned()),
        }

        state
    }

    async fn fetch(
        &self,
        viewer: &Identity,
        page_token: Option<PageToken>,
    ) -> Result<PostPage, BackendError> {
        let query = PostQuery::new(self.kind.filter(viewer))
            .limit(self.page_size)
            .page_token(page_token);

        self.posts
            .query_posts(&query)
            .await
            .inspect_err(|err| warn!(kind = ?self.kind, error = %err, "Failed to load posts"))
    }
}

impl std::fmt::Debug for PostListView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostListView")
            .field("kind", &self.kind)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
