use crate::{
    feed::LiveFeed,
    server::{
        ServerError, ServerRouter,
        auth::CurrentSession,
        extract::{Json, Query},
    },
    views::{
        feed::FeedView,
        post_list::{ListKind, PostListState, PostListView},
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use minisocial_backend::{Backend, posts::PageToken};
use serde::Deserialize;
use std::{num::NonZeroUsize, sync::Arc};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(root)
        .typed_get(feeds)
        .typed_get(my_posts)
        .typed_get(saved_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct RootPath();

async fn root(
    RootPath(): RootPath,
    State(feed): State<Arc<LiveFeed>>,
    session: CurrentSession,
) -> Json<FeedView> {
    Json(FeedView::new(feed.snapshot(), session.identity()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feeds", rejection(ServerError))]
struct FeedsPath();

async fn feeds(
    FeedsPath(): FeedsPath,
    State(feed): State<Arc<LiveFeed>>,
    session: CurrentSession,
) -> Json<FeedView> {
    Json(FeedView::new(feed.snapshot(), session.identity()))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct PageQuery {
    page_token: Option<PageToken>,
}

async fn list(
    kind: ListKind,
    backend: Backend,
    page_size: NonZeroUsize,
    session: &CurrentSession,
    page_token: Option<PageToken>,
) -> Json<PostListState> {
    let view = PostListView::new(backend.posts, kind, page_size);
    Json(view.load_page(session.identity(), page_token).await)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/my-posts", rejection(ServerError))]
struct MyPostsPath();

async fn my_posts(
    MyPostsPath(): MyPostsPath,
    State(backend): State<Backend>,
    State(page_size): State<NonZeroUsize>,
    session: CurrentSession,
    Query(query): Query<PageQuery>,
) -> Json<PostListState> {
    list(
        ListKind::MyPosts,
        backend,
        page_size,
        &session,
        query.page_token,
    )
    .await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/saved-posts", rejection(ServerError))]
struct SavedPostsPath();

async fn saved_posts(
    SavedPostsPath(): SavedPostsPath,
    State(backend): State<Backend>,
    State(page_size): State<NonZeroUsize>,
    session: CurrentSession,
    Query(query): Query<PageQuery>,
) -> Json<PostListState> {
    list(
        ListKind::SavedPosts,
        backend,
        page_size,
        &session,
        query.page_token,
    )
    .await
}
