use biggygains_core::SentimentSource;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Outcome of one [`Scheduler::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub active: Vec<String>,
    pub excluded: Vec<String>,
    pub update_rounds: u64,
}

/// Drives sentiment sources: initialize once, update on a fixed interval,
/// shut down when asked.
pub struct Scheduler {
    update_interval: Duration,
    sources: Vec<Arc<dyn SentimentSource>>,
}

impl Scheduler {
    pub fn new(update_interval: Duration) -> Self {
        Self {
            update_interval,
            sources: Vec::new(),
        }
    }

    pub fn register(&mut self, source: Arc<dyn SentimentSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Sources that fail to initialize are left out for the whole run. The
    /// others are updated every interval until `shutdown` resolves, then
    /// each of them is shut down exactly once.
    pub async fn run<F>(&self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut summary = RunSummary::default();
        let mut active: Vec<Arc<dyn SentimentSource>> = Vec::new();

        for source in &self.sources {
            if source.initialize().await {
                info!("Source '{}' initialized", source.name());
                summary.active.push(source.name().to_string());
                active.push(Arc::clone(source));
            } else {
                error!("Source '{}' failed to initialize, excluding it", source.name());
                summary.excluded.push(source.name().to_string());
            }
        }

        if active.is_empty() {
            error!("No sentiment source is running");
        }

        let mut ticker = interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately and initialize already refreshed
        ticker.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested after {} update rounds", summary.update_rounds);
                    break;
                }
                _ = ticker.tick() => {
                    for source in &active {
                        source.update().await;
                    }
                    summary.update_rounds += 1;
                    debug!("Update round {} finished", summary.update_rounds);
                }
            }
        }

        for source in &active {
            info!("Shutting down source '{}'", source.name());
            source.shutdown().await;
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use biggygains_core::{Sentiment, SentimentMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        name: String,
        healthy: bool,
        initialized: AtomicUsize,
        updates: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    impl CountingSource {
        fn new(name: &str, healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                healthy,
                initialized: AtomicUsize::new(0),
                updates: AtomicUsize::new(0),
                shutdowns: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SentimentSource for CountingSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn initialize(&self) -> bool {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            self.healthy
        }

        async fn update(&self) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        async fn get_sentiment(&self, _ticker: &str) -> Option<Vec<Sentiment>> {
            None
        }

        async fn get_all_sentiment(&self) -> SentimentMap {
            SentimentMap::new()
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_failed_sources_are_excluded() {
        let good = CountingSource::new("good", true);
        let bad = CountingSource::new("bad", false);

        let mut scheduler = Scheduler::new(Duration::from_millis(10));
        scheduler.register(good.clone()).register(bad.clone());
        assert_eq!(scheduler.source_count(), 2);

        let summary = scheduler
            .run(tokio::time::sleep(Duration::from_millis(100)))
            .await;

        assert_eq!(summary.active, vec!["good".to_string()]);
        assert_eq!(summary.excluded, vec!["bad".to_string()]);
        assert!(summary.update_rounds >= 2);

        assert_eq!(good.updates.load(Ordering::SeqCst) as u64, summary.update_rounds);
        assert_eq!(good.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(bad.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(bad.updates.load(Ordering::SeqCst), 0);
        assert_eq!(bad.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_immediate_shutdown() {
        let source = CountingSource::new("only", true);
        let mut scheduler = Scheduler::new(Duration::from_secs(3600));
        scheduler.register(source.clone());

        let summary = scheduler.run(async {}).await;

        assert_eq!(summary.update_rounds, 0);
        assert_eq!(source.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(source.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_runs_without_sources() {
        let scheduler = Scheduler::new(Duration::from_millis(5));
        let summary = scheduler
            .run(tokio::time::sleep(Duration::from_millis(20)))
            .await;
        assert!(summary.active.is_empty());
        assert!(summary.excluded.is_empty());
    }
}
