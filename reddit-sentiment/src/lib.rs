//! Reddit comment ingestion and rolling per-ticker sentiment.

pub mod aggregator;
pub mod api;
pub mod bucket;
pub mod feed;
pub mod metrics;
pub mod oracle;
pub mod persistence;
pub mod pipeline;
pub mod rate_limiter;
pub mod scorer;
pub mod source;
pub mod ticker;


pub use aggregator::{IngestOutcome, RollingAggregator, RollingWindow};
pub use api::RedditApiClient;
pub use bucket::{AddOutcome, Aggregate, DayBucket, TickerStat};
pub use feed::RedditCommentFeed;
pub use metrics::{IngestMetrics, IngestPhase, IngestStats};
pub use oracle::{CachedOracle, StaticTickerList};
pub use pipeline::{IngestionPipeline, Processed, StartupPath};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use scorer::{scorer_from_name, LexiconScorer, NeutralScorer};
pub use source::{RedditSentimentSource, RedditSentimentSourceBuilder, SourceConfig};
pub use ticker::TickerExtractor;
