use crate::server::ServerRouter;
use axum::Router;

mod create_post;
mod feed;
mod posts;
mod session;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(feed::routes())
        .merge(session::routes())
        .merge(posts::routes())
        .merge(create_post::routes())
}
