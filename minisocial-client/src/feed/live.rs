use crate::feed::Action;
use minisocial_backend::posts::{PostFilter, PostStore};
use minisocial_common::model::post::Post;
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

/// Local mirror of a live query. `loading` stays set until the first snapshot
/// arrives, even if the subscription fails.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct FeedState {
    pub loading: bool,
    pub error: Option<String>,
    pub posts: Vec<Post>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            posts: Vec::new(),
        }
    }
}

/// A feed kept current by a live subscription. Each snapshot replaces the whole
/// post list. Dropping the feed releases the subscription.
#[derive(Debug)]
pub struct LiveFeed {
    filter: PostFilter,
    state: watch::Receiver<FeedState>,
    task: JoinHandle<()>,
}

impl LiveFeed {
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn open(posts: Arc<dyn PostStore>, filter: PostFilter) -> Self {
        let (sender, state) = watch::channel(FeedState::default());

        let task = tokio::spawn(async move {
            let mut subscription = match posts.subscribe_posts(filter).await {
                Ok(subscription) => subscription,
                Err(err) => {
                    warn!(?filter, error = %err, "Could not subscribe to posts");
                    sender.send_modify(|state| {
                        state.error = Some(Action::LoadPosts.failure_message().to_owned());
                    });
                    return;
                }
            };

            while let Some(snapshot) = subscription.next_snapshot().await {
                match snapshot {
                    Ok(posts) => {
                        debug!(?filter, count = posts.len(), "Feed snapshot");
                        sender.send_replace(FeedState {
                            loading: false,
                            error: None,
                            posts,
                        });
                    }
                    Err(err) => {
                        warn!(?filter, error = %err, "Feed snapshot failed");
                        sender.send_modify(|state| {
                            state.error = Some(Action::LoadPosts.failure_message().to_owned());
                        });
                    }
                }
            }
            debug!(?filter, "Post subscription ended");
        });

        Self {
            filter,
            state,
            task,
        }
    }

    #[must_use]
    pub fn filter(&self) -> PostFilter {
        self.filter
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Changes whenever a new snapshot or error is applied.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
