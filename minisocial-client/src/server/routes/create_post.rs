use crate::{
    create_post::CreatePostFlow,
    server::{Result, ServerError, ServerRouter, auth::SignedIn, extract::Json},
    views::{
        create_post::{CreatePostForm, CreatePostView},
        feed::PostCard,
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(create_post_page)
        .typed_post(create_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create-post", rejection(ServerError))]
struct CreatePostPath();

async fn create_post_page(
    CreatePostPath(): CreatePostPath,
    State(flow): State<Arc<CreatePostFlow>>,
) -> Json<CreatePostView> {
    Json(CreatePostView::new(flow.state()))
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(flow): State<Arc<CreatePostFlow>>,
    SignedIn(identity): SignedIn,
    Json(form): Json<CreatePostForm>,
) -> Result<(StatusCode, Json<PostCard>)> {
    let image = form.selected_image()?;
    let post = flow.submit(Some(&identity), image).await?;

    Ok((StatusCode::CREATED, Json(PostCard::new(post, Some(&identity)))))
}
