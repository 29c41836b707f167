use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::CurrentSession,
        extract::{Json, Query},
    },
    session::SessionHolder,
    views::{
        auth::{AFTER_SIGN_IN, LoginForm, RegisterForm, log_in, popup, register},
        navbar::{LOGOUT_REDIRECT, Navbar},
    },
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use minisocial_backend::Backend;
use minisocial_common::model::auth::FederatedProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(login_page)
        .typed_post(submit_login)
        .typed_post(login_popup)
        .typed_get(register_page)
        .typed_post(submit_register)
        .typed_post(register_popup)
        .typed_post(logout)
        .typed_get(navbar)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct AuthPage {
    title: &'static str,
}

/// Signed-in users are sent to the feed instead of the form.
fn auth_page(session: &CurrentSession, title: &'static str) -> Response {
    if session.identity().is_some() {
        Redirect::to(AFTER_SIGN_IN).into_response()
    } else {
        Json(AuthPage { title }).into_response()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct PopupQuery {
    #[serde(default)]
    provider: FederatedProvider,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/login", rejection(ServerError))]
struct LoginPath();

async fn login_page(LoginPath(): LoginPath, session: CurrentSession) -> Response {
    auth_page(&session, "Login")
}

async fn submit_login(
    LoginPath(): LoginPath,
    State(backend): State<Backend>,
    Json(form): Json<LoginForm>,
) -> Result<Redirect> {
    log_in(&*backend.auth, &form).await?;

    Ok(Redirect::to(AFTER_SIGN_IN))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/login/popup", rejection(ServerError))]
struct LoginPopupPath();

async fn login_popup(
    LoginPopupPath(): LoginPopupPath,
    State(backend): State<Backend>,
    Query(query): Query<PopupQuery>,
) -> Result<Redirect> {
    popup(&*backend.auth, query.provider).await?;

    Ok(Redirect::to(AFTER_SIGN_IN))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/register", rejection(ServerError))]
struct RegisterPath();

async fn register_page(RegisterPath(): RegisterPath, session: CurrentSession) -> Response {
    auth_page(&session, "Register")
}

async fn submit_register(
    RegisterPath(): RegisterPath,
    State(backend): State<Backend>,
    Json(form): Json<RegisterForm>,
) -> Result<Redirect> {
    register(&*backend.auth, &form).await?;

    Ok(Redirect::to(AFTER_SIGN_IN))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/register/popup", rejection(ServerError))]
struct RegisterPopupPath();

async fn register_popup(
    RegisterPopupPath(): RegisterPopupPath,
    State(backend): State<Backend>,
    Query(query): Query<PopupQuery>,
) -> Result<Redirect> {
    popup(&*backend.auth, query.provider).await?;

    Ok(Redirect::to(AFTER_SIGN_IN))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(LogoutPath(): LogoutPath, State(session): State<Arc<SessionHolder>>) -> Redirect {
    // The local session is already cleared when the provider fails.
    if let Err(err) = session.sign_out().await {
        debug!(error = %err, "Redirecting after failed provider sign-out");
    }

    Redirect::to(LOGOUT_REDIRECT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/navbar", rejection(ServerError))]
struct NavbarPath();

async fn navbar(NavbarPath(): NavbarPath, session: CurrentSession) -> Json<Navbar> {
    Json(Navbar::new(session.identity()))
}
