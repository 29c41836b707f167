//! axum extractors that reject with [`ServerError`], so every failure gets the
//! same JSON error body.

use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::{FromRequest, FromRequestParts, Query as AxumQuery},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::{CacheControl, ContentType};
use serde::Serialize;

/// JSON bodies in both directions. View models depend on the live session,
/// so responses are never cached.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (
                TypedHeader(ContentType::json()),
                TypedHeader(CacheControl::new().with_no_store()),
                json,
            )
                .into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// Query strings such as `?page_token=...`.
#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);
