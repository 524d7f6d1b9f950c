use crate::api::RedditApiClient;
use async_trait::async_trait;
use biggygains_core::{
    CommentFeed, CommentStream, CoreError, ErrorExt, FeedComment, FeedThread, RedditApiError,
    RedditConfig,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const SEEN_CAPACITY: usize = 2_000;

/// Remembers the most recent comment ids so overlapping polls yield each
/// comment once.
#[derive(Debug)]
pub struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns false when `id` was already seen.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Keeps the unseen comments of a newest-first batch, oldest first.
pub fn admit_batch(seen: &mut SeenIds, batch: Vec<FeedComment>) -> Vec<FeedComment> {
    batch
        .into_iter()
        .rev()
        .filter(|c| seen.insert(&c.id))
        .collect()
}

/// Comments of the configured subreddits, read through the Reddit API.
pub struct RedditCommentFeed {
    client: Arc<RedditApiClient>,
    subreddits: String,
    poll_interval: Duration,
    batch_limit: u32,
}

impl RedditCommentFeed {
    pub fn new(client: Arc<RedditApiClient>, config: &RedditConfig) -> Self {
        Self {
            client,
            subreddits: config.subreddit_path(),
            poll_interval: config.poll_interval(),
            batch_limit: config.stream_batch_limit,
        }
    }
}

struct PollState {
    client: Arc<RedditApiClient>,
    subreddits: String,
    poll_interval: Duration,
    batch_limit: u32,
    seen: SeenIds,
    pending: VecDeque<FeedComment>,
    polled: bool,
    finished: bool,
}

impl PollState {
    fn pause(&self) -> Duration {
        let jitter_ms = (self.poll_interval.as_millis() as u64 / 4).max(1);
        self.poll_interval + Duration::from_millis(fastrand::u64(0..jitter_ms))
    }
}

/// A poll error that cannot clear by itself ends the stream with
/// `StreamClosed`; anything else is passed on and polling continues.
fn poll_failure(error: CoreError) -> (CoreError, bool) {
    if !error.is_fatal() {
        return (error, false);
    }
    error.log_error();
    let closed = RedditApiError::StreamClosed {
        reason: error.to_string(),
    };
    (closed.into(), true)
}

#[async_trait]
impl CommentFeed for RedditCommentFeed {
    async fn connect(&self) -> Result<(), CoreError> {
        self.client.authenticate().await?;
        info!("Connected to Reddit for r/{}", self.subreddits);
        Ok(())
    }

    async fn recent_threads(&self, limit: u32) -> Result<Vec<FeedThread>, CoreError> {
        let posts = self.client.get_new_posts(&self.subreddits, limit).await?;

        let mut threads = Vec::with_capacity(posts.len());
        for post in posts {
            let comments = match self.client.get_post_comments(&post.id).await {
                Ok(comments) => comments,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping comments of post {}: {}", post.id, e);
                    Vec::new()
                }
            };
            threads.push(FeedThread {
                id: post.id,
                title: post.title,
                comments,
            });
        }
        Ok(threads)
    }

    async fn stream_comments(&self) -> Result<CommentStream, CoreError> {
        let state = PollState {
            client: self.client.clone(),
            subreddits: self.subreddits.clone(),
            poll_interval: self.poll_interval,
            batch_limit: self.batch_limit,
            seen: SeenIds::new(SEEN_CAPACITY),
            pending: VecDeque::new(),
            polled: false,
            finished: false,
        };

        info!(
            "Polling r/{} for comments every {:?}",
            self.subreddits, self.poll_interval
        );

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if state.finished {
                    return None;
                }
                if let Some(comment) = state.pending.pop_front() {
                    return Some((Ok(comment), state));
                }

                if state.polled {
                    sleep(state.pause()).await;
                }
                state.polled = true;

                match state
                    .client
                    .get_new_comments(&state.subreddits, state.batch_limit)
                    .await
                {
                    Ok(batch) => {
                        let fresh = admit_batch(&mut state.seen, batch);
                        debug!("Poll returned {} new comments", fresh.len());
                        state.pending.extend(fresh);
                    }
                    Err(e) => {
                        let (item, finished) = poll_failure(e);
                        state.finished = finished;
                        return Some((Err(item), state));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
