use crate::model::{
    Id,
    user::{DisplayName, UserId},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::OffsetDateTime;

pub const TEXT_MAX_LEN: usize = 2000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

pub type PostId = Id<PostMarker>;
pub type CommentId = Id<CommentMarker>;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub username: DisplayName,
    pub image_url: String,
    pub likes: u64,
    pub liked_by: Vec<UserId>,
    pub saved_by: Vec<UserId>,
    pub comments: Vec<Comment>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Post {
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == user
    }

    #[must_use]
    pub fn is_liked_by(&self, user: UserId) -> bool {
        self.liked_by.contains(&user)
    }

    #[must_use]
    pub fn is_saved_by(&self, user: UserId) -> bool {
        self.saved_by.contains(&user)
    }

    #[must_use]
    pub fn comment(&self, id: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|comment| comment.id == id)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub username: DisplayName,
    pub text: Text,
    pub replies: Vec<Reply>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Reply {
    pub username: DisplayName,
    pub text: Text,
}

/// Fields supplied by the author; the store assigns the id, the timestamp and
/// zeroed engagement fields.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewPost {
    pub user_id: UserId,
    pub username: DisplayName,
    pub image_url: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewComment {
    pub username: DisplayName,
    pub text: Text,
}

/// Trimmed, non-blank comment or reply text.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Text(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
pub enum InvalidTextError {
    #[default]
    #[error("The text is empty")]
    Blank,
    #[error("The text is longer than {TEXT_MAX_LEN} characters")]
    TooLong,
}

impl Text {
    pub fn new(text: &str) -> Result<Self, InvalidTextError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(InvalidTextError::Blank);
        }
        if trimmed.chars().count() > TEXT_MAX_LEN {
            return Err(InvalidTextError::TooLong);
        }

        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for Text {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Text::new(&inner).map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"Text"))
    }
}
