use crate::{
    BackendError, Result,
    memory::lock,
    posts::{
        PageToken, PostFilter, PostPage, PostQuery, PostStore, PostSubscription, PostUpdate,
        SnapshotSource,
    },
    record::{CommentRecord, PostRecord},
};
use async_trait::async_trait;
use minisocial_common::{
    model::{
        MinisocialSnowflakeGenerator,
        post::{NewPost, Post, PostId},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, warn};

type Documents = BTreeMap<u64, PostRecord>;

/// Post collection keyed by snowflake, so key order is creation order.
#[derive(Debug)]
pub struct MemoryPostStore {
    documents: watch::Sender<Documents>,
    ids: Mutex<MinisocialSnowflakeGenerator>,
    available: AtomicBool,
}

impl MemoryPostStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            documents: watch::Sender::new(Documents::new()),
            ids: Mutex::new(MinisocialSnowflakeGenerator::new(worker_id, process_id)),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage: while unavailable every call fails with
    /// [`BackendError::Unavailable`]. Open subscriptions stay open.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            warn!("Post store call rejected while unavailable");
            Err(BackendError::Unavailable)
        }
    }

    fn next_snowflake(&self) -> Result<u64> {
        Ok(lock(&self.ids).generate()?.get())
    }
}

/// Newest first, starting below `before` if given.
fn select(
    documents: &Documents,
    filter: PostFilter,
    before: Option<PostId>,
    limit: usize,
) -> Result<PostPage> {
    let records = match before {
        Some(before) => documents.range(..u64::from(before)),
        None => documents.range(..),
    };

    let mut page = PostPage::default();
    for record in records.rev().map(|(_, record)| record) {
        let post = Post::try_from(record.clone())?;
        if !filter.matches(&post) {
            continue;
        }
        if page.posts.len() == limit {
            page.next_page_token = page.posts.last().map(|last| PageToken::after(last.id));
            break;
        }
        page.posts.push(post);
    }

    Ok(page)
}

fn apply(store: &MemoryPostStore, record: &mut PostRecord, update: PostUpdate) -> Result<bool> {
    match update {
        PostUpdate::AddMember { set, user } => Ok(record.add_member(set, user.into())),
        PostUpdate::RemoveMember { set, user } => Ok(record.remove_member(set, user.into())),
        PostUpdate::ToggleMember { set, user } => {
            record.toggle_member(set, user.into());
            Ok(true)
        }
        PostUpdate::AppendComment(comment) => {
            let comment_snowflake = store.next_snowflake()?;
            record
                .comments
                .push(CommentRecord::new(comment_snowflake, comment));
            Ok(true)
        }
        PostUpdate::AppendReply { comment, reply } => {
            let post = record.post_snowflake.into();
            let target = record
                .comment_mut(comment.into())
                .ok_or(BackendError::CommentNotFound { post, comment })?;
            target.replies.push(reply.into());
            Ok(true)
        }
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        self.check_available()?;

        let post_snowflake = self.next_snowflake()?;
        let record = PostRecord::new(post_snowflake, post, OffsetDateTime::now_utc());
        let created = Post::try_from(record.clone())?;

        self.documents.send_modify(|documents| {
            documents.insert(post_snowflake, record);
        });
        debug!(post = %created.id, user = %created.user_id, "Created post");

        Ok(created)
    }

    async fn fetch_post(&self, id: PostId) -> Result<Option<Post>> {
        self.check_available()?;

        let record = self.documents.borrow().get(&u64::from(id)).cloned();
        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn query_posts(&self, query: &PostQuery) -> Result<PostPage> {
        self.check_available()?;

        let before = query
            .page_token
            .as_ref()
            .map(PageToken::last_post)
            .transpose()?;
        let limit = query.limit.map_or(usize::MAX, NonZeroUsize::get);

        select(&self.documents.borrow(), query.filter, before, limit)
    }

    async fn subscribe_posts(&self, filter: PostFilter) -> Result<PostSubscription> {
        self.check_available()?;

        debug!(?filter, "Opened post subscription");
        Ok(PostSubscription::new(MemorySnapshots {
            documents: self.documents.subscribe(),
            filter,
            started: false,
            last: None,
        }))
    }

    async fn update_post(&self, id: PostId, update: PostUpdate) -> Result<Post> {
        self.check_available()?;

        let mut outcome = Err(BackendError::PostNotFound(id));
        self.documents.send_if_modified(|documents| {
            let Some(record) = documents.get_mut(&u64::from(id)) else {
                return false;
            };
            match apply(self, record, update) {
                Ok(changed) => {
                    outcome = Ok(record.clone());
                    changed
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });

        let post = Post::try_from(outcome?)?;
        debug!(post = %post.id, likes = post.likes, "Updated post");
        Ok(post)
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        self.check_available()?;

        let removed = self
            .documents
            .send_if_modified(|documents| documents.remove(&u64::from(id)).is_some());

        if removed {
            debug!(post = %id, "Deleted post");
            Ok(())
        } else {
            Err(BackendError::PostNotFound(id))
        }
    }
}

struct MemorySnapshots {
    documents: watch::Receiver<Documents>,
    filter: PostFilter,
    /// Set once the current state has been reported, successfully or not.
    started: bool,
    last: Option<Vec<Post>>,
}

#[async_trait]
impl SnapshotSource for MemorySnapshots {
    async fn next_snapshot(&mut self) -> Option<Result<Vec<Post>>> {
        loop {
            if self.started && self.documents.changed().await.is_err() {
                return None;
            }
            self.started = true;

            let selected = select(
                &self.documents.borrow_and_update(),
                self.filter,
                None,
                usize::MAX,
            );
            let posts = match selected {
                Ok(page) => page.posts,
                Err(err) => return Some(Err(err)),
            };

            // Changes to posts outside the filter produce no snapshot.
            if self.last.as_ref() == Some(&posts) {
                continue;
            }
            self.last = Some(posts.clone());
            return Some(Ok(posts));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        BackendError,
        memory::MemoryPostStore,
        posts::{MemberSet, PostFilter, PostQuery, PostStore, PostUpdate},
        record::PostRecord,
    };
    use minisocial_common::{
        model::{
            post::{NewComment, NewPost, Post, Reply, Text},
            user::{DisplayName, UserId},
        },
        snowflake::{ProcessId, WorkerId},
    };
    use std::num::NonZeroUsize;
    use time::OffsetDateTime;

    fn store() -> MemoryPostStore {
        MemoryPostStore::new(WorkerId::default(), ProcessId::default())
    }

    fn name(name: &str) -> DisplayName {
        DisplayName::new(name.to_owned()).unwrap()
    }

    async fn create(store: &MemoryPostStore, user: UserId, image: &str) -> Post {
        store
            .create_post(NewPost {
                user_id: user,
                username: name("ada"),
                image_url: format!("https://example.com/{image}"),
            })
            .await
            .unwrap()
    }

    async fn comment(store: &MemoryPostStore, post: &Post, text: &str) -> Post {
        store
            .update_post(
                post.id,
                PostUpdate::AppendComment(NewComment {
                    username: name("bob"),
                    text: Text::new(text).unwrap(),
                }),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn created_post_has_zeroed_engagement() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;

        assert_eq!(post.likes, 0);
        assert!(post.liked_by.is_empty());
        assert!(post.saved_by.is_empty());
        assert!(post.comments.is_empty());
        assert_eq!(store.fetch_post(post.id).await.unwrap(), Some(post));
    }

    #[tokio::test]
    async fn toggling_likes_from_any_count() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;

        for user in 10..15_u64 {
            store
                .update_post(
                    post.id,
                    PostUpdate::AddMember {
                        set: MemberSet::LikedBy,
                        user: user.into(),
                    },
                )
                .await
                .unwrap();
        }

        let toggle = PostUpdate::ToggleMember {
            set: MemberSet::LikedBy,
            user: 99.into(),
        };
        let liked = store.update_post(post.id, toggle.clone()).await.unwrap();
        assert_eq!(liked.likes, 6);
        assert!(liked.is_liked_by(99.into()));

        let unliked = store.update_post(post.id, toggle).await.unwrap();
        assert_eq!(unliked.likes, 5);
        assert!(!unliked.is_liked_by(99.into()));
        assert_eq!(unliked.likes, unliked.liked_by.len() as u64);
    }

    #[tokio::test]
    async fn saving_twice_is_a_no_op() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;
        let save = PostUpdate::AddMember {
            set: MemberSet::SavedBy,
            user: 2.into(),
        };

        let once = store.update_post(post.id, save.clone()).await.unwrap();
        let twice = store.update_post(post.id, save).await.unwrap();
        assert_eq!(once.saved_by, twice.saved_by);
        assert_eq!(twice.saved_by.len(), 1);
    }

    #[tokio::test]
    async fn comments_keep_their_prefix() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;

        let first = comment(&store, &post, "first").await;
        let second = comment(&store, &post, "second").await;

        assert_eq!(second.comments.len(), 2);
        assert_eq!(second.comments[..1], first.comments[..]);
        assert_ne!(second.comments[0].id, second.comments[1].id);
    }

    #[tokio::test]
    async fn reply_only_touches_its_comment() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;
        comment(&store, &post, "zero").await;
        comment(&store, &post, "one").await;
        let before = comment(&store, &post, "two").await;

        let target = before.comments[1].id;
        let after = store
            .update_post(
                post.id,
                PostUpdate::AppendReply {
                    comment: target,
                    reply: Reply {
                        username: name("carol"),
                        text: Text::new("agreed").unwrap(),
                    },
                },
            )
            .await
            .unwrap();

        assert_eq!(after.comments[0], before.comments[0]);
        assert_eq!(after.comments[2], before.comments[2]);
        assert_eq!(after.comments[1].replies.len(), 1);
        assert_eq!(after.comments[1].replies[0].text.get(), "agreed");
    }

    #[tokio::test]
    async fn reply_to_missing_comment() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;

        let result = store
            .update_post(
                post.id,
                PostUpdate::AppendReply {
                    comment: 12345.into(),
                    reply: Reply {
                        username: name("carol"),
                        text: Text::new("hello?").unwrap(),
                    },
                },
            )
            .await;
        assert!(matches!(result, Err(BackendError::CommentNotFound { .. })));
    }

    #[tokio::test]
    async fn second_delete_is_not_found() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;

        store.delete_post(post.id).await.unwrap();
        let again = store.delete_post(post.id).await;
        assert!(matches!(again, Err(BackendError::PostNotFound(id)) if id == post.id));
        assert!(
            store
                .update_post(
                    post.id,
                    PostUpdate::ToggleMember {
                        set: MemberSet::LikedBy,
                        user: 3.into()
                    }
                )
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn filters_and_pages() {
        let store = store();
        let mut mine = Vec::new();
        for i in 0..5 {
            mine.push(create(&store, 1.into(), &format!("{i}.png")).await);
            create(&store, 2.into(), &format!("other-{i}.png")).await;
        }

        let query = PostQuery::new(PostFilter::ByAuthor(1.into()))
            .limit(NonZeroUsize::new(2).unwrap());
        let first = store.query_posts(&query).await.unwrap();
        assert_eq!(first.posts, vec![mine[4].clone(), mine[3].clone()]);

        let second = store
            .query_posts(&query.clone().page_token(first.next_page_token))
            .await
            .unwrap();
        assert_eq!(second.posts, vec![mine[2].clone(), mine[1].clone()]);

        let third = store
            .query_posts(&query.page_token(second.next_page_token))
            .await
            .unwrap();
        assert_eq!(third.posts, vec![mine[0].clone()]);
        assert_eq!(third.next_page_token, None);
    }

    #[tokio::test]
    async fn saved_filter() {
        let store = store();
        let saved = create(&store, 1.into(), "a.png").await;
        create(&store, 1.into(), "b.png").await;
        store
            .update_post(
                saved.id,
                PostUpdate::AddMember {
                    set: MemberSet::SavedBy,
                    user: 7.into(),
                },
            )
            .await
            .unwrap();

        let page = store
            .query_posts(&PostQuery::new(PostFilter::SavedBy(7.into())))
            .await
            .unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].id, saved.id);
    }

    #[tokio::test]
    async fn subscription_replaces_snapshots() {
        let store = store();
        let post = create(&store, 1.into(), "cat.png").await;
        let mut subscription = store.subscribe_posts(PostFilter::All).await.unwrap();

        let initial = subscription.next_snapshot().await.unwrap().unwrap();
        assert_eq!(initial, vec![post.clone()]);

        let second = create(&store, 1.into(), "dog.png").await;
        let snapshot = subscription.next_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot, vec![second, post.clone()]);

        store.delete_post(post.id).await.unwrap();
        let snapshot = subscription.next_snapshot().await.unwrap().unwrap();
        assert!(snapshot.iter().all(|remaining| remaining.id != post.id));
    }

    #[tokio::test]
    async fn subscription_waits_after_unreadable_state() {
        let store = store();
        let corrupt = PostRecord {
            username: String::new(),
            ..PostRecord::new(
                1,
                NewPost {
                    user_id: 1.into(),
                    username: name("ada"),
                    image_url: "https://example.com/cat.png".to_owned(),
                },
                OffsetDateTime::UNIX_EPOCH,
            )
        };
        store.documents.send_modify(|documents| {
            documents.insert(1, corrupt);
        });

        let mut subscription = store.subscribe_posts(PostFilter::All).await.unwrap();
        assert!(matches!(
            subscription.next_snapshot().await,
            Some(Err(BackendError::Data(_)))
        ));

        tokio::select! {
            biased;
            _ = subscription.next_snapshot() => panic!("snapshot without a change"),
            () = std::future::ready(()) => {}
        }

        store.documents.send_modify(|documents| {
            documents.remove(&1);
        });
        let snapshot = subscription.next_snapshot().await.unwrap().unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn subscription_skips_unrelated_changes() {
        let store = store();
        let mut subscription = store
            .subscribe_posts(PostFilter::ByAuthor(1.into()))
            .await
            .unwrap();
        assert!(subscription.next_snapshot().await.unwrap().unwrap().is_empty());

        create(&store, 2.into(), "not-mine.png").await;
        let mine = create(&store, 1.into(), "mine.png").await;

        let snapshot = subscription.next_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot, vec![mine]);
    }

    #[tokio::test]
    async fn subscription_ends_with_store() {
        let store = store();
        let mut subscription = store.subscribe_posts(PostFilter::All).await.unwrap();
        subscription.next_snapshot().await.unwrap().unwrap();

        drop(store);
        assert!(subscription.next_snapshot().await.is_none());
    }

    #[tokio::test]
    async fn outage_rejects_calls() {
        let store = store();
        store.set_available(false);
        assert!(matches!(
            store.query_posts(&PostQuery::default()).await,
            Err(BackendError::Unavailable)
        ));

        store.set_available(true);
        assert!(store.query_posts(&PostQuery::default()).await.is_ok());
    }
}
