use crate::aggregator::RollingAggregator;
use crate::metrics::{IngestMetrics, IngestStats};
use crate::persistence;
use crate::pipeline::{IngestionPipeline, StartupPath};
use crate::ticker::TickerExtractor;
use async_trait::async_trait;
use biggygains_core::{
    AppConfig, CommentFeed, ConfigError, CoreError, Datastore, ErrorExt, Sentiment,
    SentimentMap, SentimentScorer, SentimentSource, TickerOracle,
};
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const SOURCE_NAME: &str = "reddit";

/// Settings the Reddit source needs out of the application config.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub max_days: usize,
    pub state_key: String,
    pub backfill_thread_limit: u32,
}

impl SourceConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            max_days: config.sentiment.max_days,
            state_key: config.sentiment.state_key.clone(),
            backfill_thread_limit: config.reddit.backfill_thread_limit,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

#[derive(Default)]
pub struct RedditSentimentSourceBuilder {
    feed: Option<Arc<dyn CommentFeed>>,
    oracle: Option<Arc<dyn TickerOracle>>,
    scorer: Option<Arc<dyn SentimentScorer>>,
    datastore: Option<Arc<dyn Datastore>>,
    config: Option<SourceConfig>,
    start_date: Option<NaiveDate>,
    stop_grace: Option<Duration>,
}

impl RedditSentimentSourceBuilder {
    pub fn feed(mut self, feed: Arc<dyn CommentFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn TickerOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn datastore(mut self, datastore: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(datastore);
        self
    }

    pub fn config(mut self, config: SourceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Active day of a fresh window. Defaults to today's UTC date.
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = Some(grace);
        self
    }

    pub fn build(self) -> Result<RedditSentimentSource, CoreError> {
        let feed = self.feed.ok_or_else(|| missing("feed"))?;
        let oracle = self.oracle.ok_or_else(|| missing("oracle"))?;
        let scorer = self.scorer.ok_or_else(|| missing("scorer"))?;
        let datastore = self.datastore.ok_or_else(|| missing("datastore"))?;
        let config = self.config.ok_or_else(|| missing("config"))?;

        let start = self
            .start_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let aggregator = Arc::new(RollingAggregator::new(start, config.max_days)?);

        let mut pipeline = IngestionPipeline::new(
            feed.clone(),
            TickerExtractor::new(oracle),
            scorer,
            aggregator,
            IngestMetrics::new(),
        );
        if let Some(grace) = self.stop_grace {
            pipeline = pipeline.with_stop_grace(grace);
        }

        Ok(RedditSentimentSource {
            feed,
            datastore,
            config,
            pipeline: Arc::new(pipeline),
            current: RwLock::new(Arc::new(SentimentMap::new())),
            startup: RwLock::new(None),
            shut_down: AtomicBool::new(false),
        })
    }
}

fn missing(field: &str) -> CoreError {
    ConfigError::MissingField {
        field: field.to_string(),
    }
    .into()
}

/// Sentiment from Reddit comments, refreshed by the scheduler.
pub struct RedditSentimentSource {
    feed: Arc<dyn CommentFeed>,
    datastore: Arc<dyn Datastore>,
    config: SourceConfig,
    pipeline: Arc<IngestionPipeline>,
    current: RwLock<Arc<SentimentMap>>,
    startup: RwLock<Option<StartupPath>>,
    shut_down: AtomicBool,
}

impl RedditSentimentSource {
    pub fn builder() -> RedditSentimentSourceBuilder {
        RedditSentimentSourceBuilder::default()
    }

    async fn start(&self) -> Result<StartupPath, CoreError> {
        // Without a datastore the source still runs; restore falls back to
        // backfill and the shutdown save is lost.
        if let Err(e) = self.datastore.initialize().await {
            e.log_warn();
            warn!("Datastore unavailable, sentiment state will not be restored or saved");
        }
        self.feed.connect().await?;

        let path = self
            .pipeline
            .restore_or_backfill(
                self.datastore.as_ref(),
                &self.config.state_key,
                self.config.backfill_thread_limit,
            )
            .await?;

        if let Err(e) = self.pipeline.spawn_listener().await {
            e.log_error();
            warn!("Live comments unavailable, serving startup state only");
        }

        Ok(path)
    }

    async fn persist(&self) -> Result<(), CoreError> {
        let window = self.pipeline.aggregator().snapshot().await;
        let raw = persistence::encode(&window)?;
        self.datastore.put(&self.config.state_key, &raw).await?;
        info!(
            "Saved {} bytes of sentiment state under '{}'",
            raw.len(),
            self.config.state_key
        );
        Ok(())
    }

    /// True once the live stream has failed; queries keep returning the last
    /// snapshot.
    pub fn is_stale(&self) -> bool {
        self.pipeline.is_stale()
    }

    pub async fn startup_path(&self) -> Option<StartupPath> {
        *self.startup.read().await
    }

    pub async fn ingest_stats(&self) -> IngestStats {
        self.pipeline.metrics().get_stats().await
    }

    /// Ingest counters as pretty-printed JSON.
    pub async fn export_ingest_metrics(&self) -> Result<String, CoreError> {
        Ok(self.pipeline.metrics().export_metrics().await?)
    }
}

#[async_trait]
impl SentimentSource for RedditSentimentSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn initialize(&self) -> bool {
        info!("Initializing {} sentiment source", SOURCE_NAME);
        match self.start().await {
            Ok(path) => {
                info!("{} source ready ({:?})", SOURCE_NAME, path);
                *self.startup.write().await = Some(path);
                self.update().await;
                true
            }
            Err(e) => {
                e.log_error();
                error!(
                    "{} source failed to initialize: {}",
                    SOURCE_NAME,
                    e.user_friendly_message()
                );
                false
            }
        }
    }

    async fn update(&self) {
        let fresh = self.pipeline.aggregator().recompute().await;
        debug!("Sentiment refreshed for {} tickers", fresh.len());
        if self.is_stale() {
            warn!("{} source is stale, live comments stopped", SOURCE_NAME);
        }
        *self.current.write().await = Arc::new(fresh);
    }

    async fn get_sentiment(&self, ticker: &str) -> Option<Vec<Sentiment>> {
        let current = self.current.read().await.clone();
        current.get(&ticker.to_ascii_uppercase()).cloned()
    }

    async fn get_all_sentiment(&self) -> SentimentMap {
        let current = self.current.read().await.clone();
        current.as_ref().clone()
    }

    async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("{} source already shut down", SOURCE_NAME);
            return;
        }

        info!("Shutting down {} sentiment source", SOURCE_NAME);
        self.pipeline.stop_and_join().await;

        if self.startup.read().await.is_none() {
            warn!("{} source never started, keeping saved state", SOURCE_NAME);
            return;
        }

        if let Err(e) = self.persist().await {
            e.log_error();
            error!("Sentiment state was not saved; the next run will backfill");
        }
    }
}
