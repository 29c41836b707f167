use crate::{
    feed::FeedActions,
    server::{Result, ServerError, ServerRouter, auth::CurrentSession, extract::Json},
    views::feed::PostCard,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use minisocial_backend::Backend;
use minisocial_common::model::post::{CommentId, Post, PostId};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(like_post)
        .typed_post(save_post)
        .typed_post(unsave_post)
        .typed_post(comment_post)
        .typed_post(reply_comment)
        .typed_delete(delete_post)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct TextBody {
    text: String,
}

fn card(post: Post, session: &CurrentSession) -> Json<PostCard> {
    Json(PostCard::new(post, session.identity()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct LikePostPath {
    id: PostId,
}

async fn like_post(
    LikePostPath { id }: LikePostPath,
    State(actions): State<FeedActions>,
    session: CurrentSession,
) -> Result<Json<PostCard>> {
    let post = actions.toggle_like(session.identity(), id).await?;

    Ok(card(post, &session))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/save", rejection(ServerError))]
struct SavePostPath {
    id: PostId,
}

async fn save_post(
    SavePostPath { id }: SavePostPath,
    State(actions): State<FeedActions>,
    session: CurrentSession,
) -> Result<Json<PostCard>> {
    let post = actions.save(session.identity(), id).await?;

    Ok(card(post, &session))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/unsave", rejection(ServerError))]
struct UnsavePostPath {
    id: PostId,
}

async fn unsave_post(
    UnsavePostPath { id }: UnsavePostPath,
    State(actions): State<FeedActions>,
    session: CurrentSession,
) -> Result<Json<PostCard>> {
    let post = actions.unsave(session.identity(), id).await?;

    Ok(card(post, &session))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct CommentPostPath {
    id: PostId,
}

async fn comment_post(
    CommentPostPath { id }: CommentPostPath,
    State(actions): State<FeedActions>,
    session: CurrentSession,
    Json(body): Json<TextBody>,
) -> Result<Json<PostCard>> {
    let post = actions.comment(session.identity(), id, &body.text).await?;

    Ok(card(post, &session))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments/{comment}/replies", rejection(ServerError))]
struct ReplyCommentPath {
    id: PostId,
    comment: CommentId,
}

async fn reply_comment(
    ReplyCommentPath { id, comment }: ReplyCommentPath,
    State(actions): State<FeedActions>,
    session: CurrentSession,
    Json(body): Json<TextBody>,
) -> Result<Json<PostCard>> {
    let post = actions
        .reply(session.identity(), id, comment, &body.text)
        .await?;

    Ok(card(post, &session))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: PostId,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    State(backend): State<Backend>,
    State(actions): State<FeedActions>,
    session: CurrentSession,
) -> Result<StatusCode> {
    let post = backend
        .posts
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    actions.delete(session.identity(), &post).await?;

    Ok(StatusCode::NO_CONTENT)
}
