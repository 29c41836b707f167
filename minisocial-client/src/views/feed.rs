use crate::{feed::FeedState, views::LOADING_MESSAGE};
use minisocial_common::model::{post::Post, user::Identity};
use serde::Serialize;

/// A post as seen by the current viewer.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub post: Post,
    pub liked: bool,
    pub saved: bool,
    pub owned: bool,
}

impl PostCard {
    #[must_use]
    pub fn new(post: Post, viewer: Option<&Identity>) -> Self {
        let (liked, saved, owned) = viewer.map_or((false, false, false), |viewer| {
            (
                post.is_liked_by(viewer.id),
                post.is_saved_by(viewer.id),
                post.is_owned_by(viewer.id),
            )
        });

        Self {
            post,
            liked,
            saved,
            owned,
        }
    }

    #[must_use]
    pub fn cards(posts: Vec<Post>, viewer: Option<&Identity>) -> Vec<Self> {
        posts
            .into_iter()
            .map(|post| Self::new(post, viewer))
            .collect()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct FeedView {
    pub title: &'static str,
    pub message: Option<&'static str>,
    pub error: Option<String>,
    pub posts: Vec<PostCard>,
}

impl FeedView {
    pub const TITLE: &'static str = "Feeds";

    #[must_use]
    pub fn new(state: FeedState, viewer: Option<&Identity>) -> Self {
        Self {
            title: Self::TITLE,
            message: state.loading.then_some(LOADING_MESSAGE),
            error: state.error,
            posts: PostCard::cards(state.posts, viewer),
        }
    }
}
