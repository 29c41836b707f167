use minisocial_common::model::user::Identity;
use serde::Serialize;

pub const APP_TITLE: &str = "Social Media App";
pub const LOGOUT_REDIRECT: &str = "/login";

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Navbar {
    pub title: &'static str,
    /// `None` while signed out; the logout button is only shown alongside it.
    pub greeting: Option<String>,
}

impl Navbar {
    #[must_use]
    pub fn new(session: Option<&Identity>) -> Self {
        Self {
            title: APP_TITLE,
            greeting: session.map(|identity| format!("Welcome, {}", identity.greeting_name())),
        }
    }
}
