use crate::bucket::{AddOutcome, Aggregate, DayBucket};
use biggygains_core::{Comment, ConfigError, CoreError, SentimentMap};
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The active day plus summaries of past days, most recent first.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    pub today: DayBucket,
    pub history: Vec<Aggregate>,
}

impl RollingWindow {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            today: DayBucket::new(date),
            history: Vec::new(),
        }
    }

    fn is_pristine(&self) -> bool {
        self.today.is_empty() && self.history.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    Rotated,
    Late,
}

/// Day-bucketed sentiment state shared between the listener and readers.
///
/// Every read and write goes through one mutex, so a `recompute` sees exactly
/// the ingests that finished before it took the lock.
#[derive(Debug)]
pub struct RollingAggregator {
    max_days: usize,
    window: Mutex<RollingWindow>,
}

impl RollingAggregator {
    /// `max_days` counts the active day, so at most `max_days - 1` past days
    /// are kept.
    pub fn new(start: NaiveDate, max_days: usize) -> Result<Self, CoreError> {
        if max_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sentiment.max_days".to_string(),
                value: max_days.to_string(),
            }
            .into());
        }
        Ok(Self {
            max_days,
            window: Mutex::new(RollingWindow::new(start)),
        })
    }

    pub fn max_days(&self) -> usize {
        self.max_days
    }

    fn history_cap(&self) -> usize {
        self.max_days - 1
    }

    pub async fn ingest(&self, date: NaiveDate, comment: Comment) -> IngestOutcome {
        let mut window = self.window.lock().await;
        match window.today.add(date, comment) {
            AddOutcome::Stored => IngestOutcome::Stored,
            AddOutcome::Late => IngestOutcome::Late,
            AddOutcome::Rotated(closed) => {
                window.history.insert(0, closed);
                let cap = self.history_cap();
                if window.history.len() > cap {
                    debug!(
                        "Evicting {} day(s) beyond the {} day window",
                        window.history.len() - cap,
                        self.max_days
                    );
                    window.history.truncate(cap);
                }
                IngestOutcome::Rotated
            }
        }
    }

    /// Per-ticker sentiment, today first and then each stored past day.
    pub async fn recompute(&self) -> SentimentMap {
        let window = self.window.lock().await;
        let live = window.today.aggregate();

        let mut sentiment = SentimentMap::new();
        for day in std::iter::once(&live).chain(window.history.iter()) {
            for (ticker, stat) in day {
                sentiment
                    .entry(ticker.clone())
                    .or_default()
                    .push(stat.to_sentiment(ticker));
            }
        }
        sentiment
    }

    pub async fn snapshot(&self) -> RollingWindow {
        self.window.lock().await.clone()
    }

    /// Replaces the whole window, trimming history to the configured cap.
    pub async fn restore(&self, mut restored: RollingWindow) {
        restored.history.truncate(self.history_cap());
        info!(
            "Restored window at {} with {} comments and {} past days",
            restored.today.date(),
            restored.today.len(),
            restored.history.len()
        );
        *self.window.lock().await = restored;
    }

    /// Moves an untouched window to `date`. Refused once anything has been
    /// ingested or restored, since the active day must never move backwards
    /// over stored data.
    pub async fn rebase(&self, date: NaiveDate) -> bool {
        let mut window = self.window.lock().await;
        if !window.is_pristine() {
            return false;
        }
        window.today = DayBucket::new(date);
        true
    }

    pub async fn current_date(&self) -> NaiveDate {
        self.window.lock().await.today.date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::TickerStat;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    fn comment(id: &str, ticker: &str, score: i8) -> Comment {
        Comment {
            id: id.to_string(),
            body: String::new(),
            ticker: Some(ticker.to_string()),
            sentiment_score: score,
        }
    }

    #[test]
    fn test_zero_day_window_is_rejected() {
        assert!(RollingAggregator::new(day(1), 0).is_err());
    }

    #[tokio::test]
    async fn test_history_is_capped_most_recent_first() {
        let aggregator = RollingAggregator::new(day(1), 3).unwrap();

        // the score encodes the day so the order can be checked
        for d in 1..=6u32 {
            let outcome = aggregator
                .ingest(day(d), comment(&format!("c{}", d), "GME", d as i8))
                .await;
            if d > 1 {
                assert_eq!(outcome, IngestOutcome::Rotated);
            }
        }

        let window = aggregator.snapshot().await;
        assert_eq!(window.today.date(), day(6));
        assert_eq!(window.history.len(), 2);

        let values: Vec<f64> = aggregator.recompute().await["GME"]
            .iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec![6.0, 5.0, 4.0]);
    }

    #[tokio::test]
    async fn test_recompute_orders_today_first() {
        let aggregator = RollingAggregator::new(day(1), 5).unwrap();
        aggregator.ingest(day(1), comment("a", "GME", 1)).await;
        aggregator.ingest(day(1), comment("b", "GME", 1)).await;
        aggregator.ingest(day(2), comment("c", "GME", -1)).await;
        aggregator.ingest(day(2), comment("d", "AMC", 1)).await;

        let sentiment = aggregator.recompute().await;

        let gme = &sentiment["GME"];
        assert_eq!(gme.len(), 2);
        assert_eq!((gme[0].value, gme[0].confidence), (-1.0, 1));
        assert_eq!((gme[1].value, gme[1].confidence), (1.0, 2));

        // AMC only appeared today
        assert_eq!(sentiment["AMC"].len(), 1);
    }

    #[tokio::test]
    async fn test_single_day_window_keeps_no_history() {
        let aggregator = RollingAggregator::new(day(1), 1).unwrap();
        aggregator.ingest(day(1), comment("a", "GME", 1)).await;
        aggregator.ingest(day(2), comment("b", "GME", -1)).await;

        let window = aggregator.snapshot().await;
        assert!(window.history.is_empty());
        assert_eq!(aggregator.recompute().await["GME"].len(), 1);
    }

    #[tokio::test]
    async fn test_late_ingest_leaves_window_untouched() {
        let aggregator = RollingAggregator::new(day(5), 5).unwrap();
        aggregator.ingest(day(5), comment("a", "GME", 1)).await;
        let before = aggregator.snapshot().await;

        let outcome = aggregator.ingest(day(4), comment("b", "GME", -1)).await;

        assert_eq!(outcome, IngestOutcome::Late);
        assert_eq!(aggregator.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_rebase_only_when_pristine() {
        let aggregator = RollingAggregator::new(day(10), 5).unwrap();
        assert!(aggregator.rebase(day(3)).await);
        assert_eq!(aggregator.current_date().await, day(3));

        aggregator.ingest(day(3), comment("a", "GME", 1)).await;
        assert!(!aggregator.rebase(day(1)).await);
        assert_eq!(aggregator.current_date().await, day(3));
    }

    #[tokio::test]
    async fn test_restore_trims_history() {
        let aggregator = RollingAggregator::new(day(1), 2).unwrap();
        let mut past = Aggregate::new();
        past.insert("GME".to_string(), TickerStat { mean: 0.5, count: 2 });

        aggregator
            .restore(RollingWindow {
                today: DayBucket::new(day(9)),
                history: vec![past.clone(), past.clone(), past],
            })
            .await;

        let window = aggregator.snapshot().await;
        assert_eq!(window.today.date(), day(9));
        assert_eq!(window.history.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingest_and_recompute() {
        let aggregator = Arc::new(RollingAggregator::new(day(1), 5).unwrap());
        let writers = 8;
        let per_writer = 50;

        let mut handles = Vec::new();
        for w in 0..writers {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..per_writer {
                    let score = if i % 2 == 0 { 1 } else { -1 };
                    aggregator
                        .ingest(day(1), comment(&format!("{}-{}", w, i), "GME", score))
                        .await;
                }
            }));
        }

        let reader = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..100 {
                    let count = aggregator
                        .recompute()
                        .await
                        .get("GME")
                        .map(|days| days[0].confidence)
                        .unwrap_or(0);
                    assert!(count >= last, "snapshot went backwards");
                    last = count;
                    tokio::task::yield_now().await;
                }
            })
        };

        for handle in handles {
            handle.await.unwrap();
        }
        reader.await.unwrap();

        let sentiment = aggregator.recompute().await;
        let today = &sentiment["GME"][0];
        assert_eq!(today.confidence, (writers * per_writer) as u32);
        assert!(today.value.abs() < 1e-9);
    }
}
