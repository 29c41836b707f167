use crate::posts::MemberSet;
use minisocial_common::model::{
    ModelValidationError,
    post::{Comment, NewComment, NewPost, Post, Reply, Text},
    user::DisplayName,
};
use time::OffsetDateTime;

/// A post document as the store keeps it: raw ids and strings, validated
/// again when read back.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) struct PostRecord {
    pub post_snowflake: u64,
    pub user_snowflake: u64,
    pub username: String,
    pub image_url: String,
    pub likes: u64,
    pub liked_by: Vec<u64>,
    pub saved_by: Vec<u64>,
    pub comments: Vec<CommentRecord>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: u64,
    pub username: String,
    pub text: String,
    pub replies: Vec<ReplyRecord>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) struct ReplyRecord {
    pub username: String,
    pub text: String,
}

impl PostRecord {
    pub fn new(post_snowflake: u64, post: NewPost, created_at: OffsetDateTime) -> Self {
        Self {
            post_snowflake,
            user_snowflake: post.user_id.into(),
            username: post.username.into_inner(),
            image_url: post.image_url,
            likes: 0,
            liked_by: Vec::new(),
            saved_by: Vec::new(),
            comments: Vec::new(),
            created_at,
        }
    }

    /// Returns whether the set changed.
    pub fn add_member(&mut self, set: MemberSet, user: u64) -> bool {
        let members = self.members_mut(set);
        if members.contains(&user) {
            return false;
        }
        members.push(user);
        if set == MemberSet::LikedBy {
            self.likes += 1;
        }
        true
    }

    /// Returns whether the set changed.
    pub fn remove_member(&mut self, set: MemberSet, user: u64) -> bool {
        let members = self.members_mut(set);
        let before = members.len();
        members.retain(|member| *member != user);
        let removed = members.len() != before;
        if removed && set == MemberSet::LikedBy {
            self.likes = self.likes.saturating_sub(1);
        }
        removed
    }

    pub fn toggle_member(&mut self, set: MemberSet, user: u64) {
        if !self.remove_member(set, user) {
            self.add_member(set, user);
        }
    }

    pub fn comment_mut(&mut self, comment_snowflake: u64) -> Option<&mut CommentRecord> {
        self.comments
            .iter_mut()
            .find(|comment| comment.comment_snowflake == comment_snowflake)
    }

    fn members_mut(&mut self, set: MemberSet) -> &mut Vec<u64> {
        match set {
            MemberSet::LikedBy => &mut self.liked_by,
            MemberSet::SavedBy => &mut self.saved_by,
        }
    }
}

impl CommentRecord {
    pub fn new(comment_snowflake: u64, comment: NewComment) -> Self {
        Self {
            comment_snowflake,
            username: comment.username.into_inner(),
            text: comment.text.get().to_owned(),
            replies: Vec::new(),
        }
    }
}

impl From<Reply> for ReplyRecord {
    fn from(value: Reply) -> Self {
        Self {
            username: value.username.into_inner(),
            text: value.text.get().to_owned(),
        }
    }
}

impl TryFrom<ReplyRecord> for Reply {
    type Error = ModelValidationError;

    fn try_from(value: ReplyRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            username: DisplayName::new(value.username)?,
            text: Text::new(&value.text)?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_snowflake.into(),
            username: DisplayName::new(value.username)?,
            text: Text::new(&value.text)?,
            replies: value
                .replies
                .into_iter()
                .map(Reply::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_snowflake.into(),
            user_id: value.user_snowflake.into(),
            username: DisplayName::new(value.username)?,
            image_url: value.image_url,
            likes: value.likes,
            liked_by: value.liked_by.into_iter().map(Into::into).collect(),
            saved_by: value.saved_by.into_iter().map(Into::into).collect(),
            comments: value
                .comments
                .into_iter()
                .map(Comment::try_from)
                .collect::<Result<_, _>>()?,
            created_at: value.created_at,
        })
    }
}
