pub mod config;
pub mod create_post;
pub mod feed;
pub mod server;
pub mod session;
pub mod views;
