use crate::aggregator::{IngestOutcome, RollingAggregator};
use crate::metrics::{IngestMetrics, IngestPhase};
use crate::persistence;
use crate::ticker::TickerExtractor;
use biggygains_core::{
    Comment, CommentFeed, CoreError, Datastore, ErrorExt, FeedComment, ScoringError,
    SentimentScorer,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// How the window was populated at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPath {
    Restored,
    Backfilled { comments: usize },
}

/// What happened to a single comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    Ingested(String),
    Late(String),
    Untracked,
}

/// Feeds comments through ticker extraction and scoring into the aggregator,
/// first from recent threads or saved state, then from the live stream.
pub struct IngestionPipeline {
    feed: Arc<dyn CommentFeed>,
    extractor: TickerExtractor,
    scorer: Arc<dyn SentimentScorer>,
    aggregator: Arc<RollingAggregator>,
    metrics: IngestMetrics,
    stop: Arc<AtomicBool>,
    stale: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
    stop_grace: Duration,
}

impl IngestionPipeline {
    pub fn new(
        feed: Arc<dyn CommentFeed>,
        extractor: TickerExtractor,
        scorer: Arc<dyn SentimentScorer>,
        aggregator: Arc<RollingAggregator>,
        metrics: IngestMetrics,
    ) -> Self {
        Self {
            feed,
            extractor,
            scorer,
            aggregator,
            metrics,
            stop: Arc::new(AtomicBool::new(false)),
            stale: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// How long [`stop_and_join`](Self::stop_and_join) waits for the next
    /// stream item before aborting the listener.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn aggregator(&self) -> &Arc<RollingAggregator> {
        &self.aggregator
    }

    pub fn metrics(&self) -> &IngestMetrics {
        &self.metrics
    }

    /// Loads the window saved under `key`. When there is none, or it cannot be
    /// decoded, the newest `thread_limit` threads are backfilled instead.
    pub async fn restore_or_backfill(
        &self,
        datastore: &dyn Datastore,
        key: &str,
        thread_limit: u32,
    ) -> Result<StartupPath, CoreError> {
        match datastore.get(key).await {
            Ok(Some(raw)) => {
                let current = self.aggregator.current_date().await;
                match persistence::decode(&raw, current) {
                    Ok(window) => {
                        self.aggregator.restore(window).await;
                        return Ok(StartupPath::Restored);
                    }
                    Err(e) => {
                        e.log_warn();
                        warn!("Saved state under '{}' is unusable, backfilling", key);
                    }
                }
            }
            Ok(None) => info!("No saved state under '{}', backfilling", key),
            Err(e) => {
                e.log_warn();
                warn!("Could not read saved state under '{}', backfilling", key);
            }
        }

        let comments = self.backfill(thread_limit).await?;
        Ok(StartupPath::Backfilled { comments })
    }

    /// Ingests every comment of the newest threads in posting order. Returns
    /// the number of comments read.
    pub async fn backfill(&self, thread_limit: u32) -> Result<usize, CoreError> {
        let threads = self.feed.recent_threads(thread_limit).await?;

        let mut comments: Vec<FeedComment> = threads
            .into_iter()
            .flat_map(|thread| thread.comments)
            .collect();
        comments.sort_by_key(|c| c.created_utc);

        info!("Backfilling {} comments", comments.len());

        if let Some(first) = comments.first() {
            let start = first.created_date();
            if self.aggregator.rebase(start).await {
                debug!("Window rebased to {}", start);
            }
        }

        for comment in &comments {
            if let Err(e) = self.process(comment, IngestPhase::Backfill).await {
                self.metrics.record_failure(IngestPhase::Backfill).await;
                warn!("Skipping backfill comment {}: {}", comment.id, e);
            }
        }

        Ok(comments.len())
    }

    pub async fn process(
        &self,
        comment: &FeedComment,
        phase: IngestPhase,
    ) -> Result<Processed, CoreError> {
        let ticker = match self.extractor.extract(&comment.body).await? {
            Some(ticker) => ticker,
            None => {
                debug!("No ticker in comment {}", comment.id);
                self.metrics.record_untracked(phase).await;
                return Ok(Processed::Untracked);
            }
        };

        let sentiment_score = self.scorer.score(&comment.body).await?;
        if !(-1..=1).contains(&sentiment_score) {
            return Err(ScoringError::OutOfRange {
                score: sentiment_score,
            }
            .into());
        }

        let analyzed = Comment {
            id: comment.id.clone(),
            body: comment.body.clone(),
            ticker: Some(ticker.clone()),
            sentiment_score,
        };

        let outcome = self
            .aggregator
            .ingest(comment.created_date(), analyzed)
            .await;
        self.metrics.record_ingest(phase, &ticker, outcome).await;

        match outcome {
            IngestOutcome::Late => Ok(Processed::Late(ticker)),
            _ => Ok(Processed::Ingested(ticker)),
        }
    }

    /// Subscribes to the live stream and ingests it on a background task.
    /// A subscription failure is returned and marks the pipeline stale.
    pub async fn spawn_listener(self: &Arc<Self>) -> Result<(), CoreError> {
        let mut stream = match self.feed.stream_comments().await {
            Ok(stream) => stream,
            Err(e) => {
                self.stale.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };

        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!("Live listener started");
            loop {
                let item = stream.next().await;
                if pipeline.stop.load(Ordering::SeqCst) {
                    info!("Live listener stopping");
                    return;
                }

                match item {
                    Some(Ok(comment)) => {
                        if let Err(e) = pipeline.process(&comment, IngestPhase::Live).await {
                            pipeline.metrics.record_failure(IngestPhase::Live).await;
                            warn!("Skipping live comment {}: {}", comment.id, e);
                        }
                    }
                    Some(Err(e)) if e.is_fatal() => {
                        e.log_error();
                        error!("Comment stream failed, serving last snapshot");
                        pipeline.stale.store(true, Ordering::SeqCst);
                        return;
                    }
                    Some(Err(e)) => {
                        pipeline.metrics.record_failure(IngestPhase::Live).await;
                        warn!("Skipping undeliverable stream item: {}", e);
                    }
                    None => {
                        error!("Comment stream ended, serving last snapshot");
                        pipeline.stale.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            }
        });

        *self.listener.lock().await = Some(handle);
        Ok(())
    }

    /// Asks the listener to stop and waits for it. The flag is checked after
    /// each delivered item; a listener still parked on an idle stream after
    /// the grace period is aborted.
    pub async fn stop_and_join(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self.listener.lock().await.take();
        let Some(mut handle) = handle else {
            return;
        };

        match tokio::time::timeout(self.stop_grace, &mut handle).await {
            Ok(Ok(())) => debug!("Live listener joined"),
            Ok(Err(e)) => error!("Live listener panicked: {}", e),
            Err(_) => {
                warn!(
                    "Live listener idle after {:?}, aborting it",
                    self.stop_grace
                );
                handle.abort();
            }
        }
    }

    /// True once the live stream has failed or ended.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }
}
