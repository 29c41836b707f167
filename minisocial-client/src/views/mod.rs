//! View models: what each page shows, derived from the session and the
//! backend. They keep only ephemeral state.

pub mod auth;
pub mod create_post;
pub mod feed;
pub mod navbar;
pub mod post_list;

pub const LOADING_MESSAGE: &str = "Loading...";
