//! Capability interfaces.
//!
//! None of these traits carry default method bodies: an implementation has to
//! provide every operation, so a missing capability is a compile error rather
//! than a warning at call time.

use crate::{CoreError, FeedComment, FeedThread, Sentiment, SentimentMap};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Unbounded stream of live comments. An `Err` item for which
/// [`ErrorExt::is_fatal`](crate::ErrorExt::is_fatal) holds ends the stream;
/// any other `Err` item concerns that item only.
pub type CommentStream = BoxStream<'static, Result<FeedComment, CoreError>>;

/// Answers whether a symbol is a real, tradable ticker.
#[async_trait]
pub trait TickerOracle: Send + Sync {
    async fn exists(&self, symbol: &str) -> Result<bool, CoreError>;
}

/// Scores a piece of text: negative is bearish, zero neutral, positive bullish.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<i8, CoreError>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait CommentFeed: Send + Sync {
    async fn connect(&self) -> Result<(), CoreError>;

    /// The `limit` most recent threads with their comments.
    async fn recent_threads(&self, limit: u32) -> Result<Vec<FeedThread>, CoreError>;

    async fn stream_comments(&self) -> Result<CommentStream, CoreError>;
}

/// Key-value persistence shared by every component that survives restarts.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn initialize(&self) -> Result<(), CoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CoreError>;

    async fn clear(&self) -> Result<(), CoreError>;
}

/// A sentiment source driven by the scheduler.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Returns false when the source cannot run; the scheduler then leaves it
    /// out for the rest of the run.
    async fn initialize(&self) -> bool;

    /// Refreshes the snapshot served by the query methods.
    async fn update(&self);

    async fn get_sentiment(&self, ticker: &str) -> Option<Vec<Sentiment>>;

    async fn get_all_sentiment(&self) -> SentimentMap;

    /// Stops background work and persists state. Called at most once.
    async fn shutdown(&self);
}
