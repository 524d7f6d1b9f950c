use crate::aggregator::IngestOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestPhase {
    Backfill,
    Live,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub backfilled_comments: u64,
    pub live_comments: u64,
    pub stored: u64,
    pub rotations: u64,
    pub late_dropped: u64,
    /// Comments with no resolvable ticker.
    pub untracked: u64,
    pub failed: u64,
    pub last_ingest_time: Option<SystemTime>,
    pub comments_by_ticker: HashMap<String, u64>,
}

impl IngestStats {
    pub fn total_seen(&self) -> u64 {
        self.backfilled_comments + self.live_comments
    }
}

#[derive(Debug, Clone)]
pub struct IngestMetrics {
    stats: Arc<RwLock<IngestStats>>,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(IngestStats::default())),
        }
    }

    pub async fn record_ingest(&self, phase: IngestPhase, ticker: &str, outcome: IngestOutcome) {
        let mut stats = self.stats.write().await;
        Self::count_phase(&mut stats, phase);

        match outcome {
            IngestOutcome::Stored => stats.stored += 1,
            IngestOutcome::Rotated => {
                stats.stored += 1;
                stats.rotations += 1;
            }
            IngestOutcome::Late => {
                stats.late_dropped += 1;
                return;
            }
        }

        *stats
            .comments_by_ticker
            .entry(ticker.to_string())
            .or_insert(0) += 1;
        stats.last_ingest_time = Some(SystemTime::now());
    }

    pub async fn record_untracked(&self, phase: IngestPhase) {
        let mut stats = self.stats.write().await;
        Self::count_phase(&mut stats, phase);
        stats.untracked += 1;
    }

    pub async fn record_failure(&self, phase: IngestPhase) {
        let mut stats = self.stats.write().await;
        Self::count_phase(&mut stats, phase);
        stats.failed += 1;
    }

    fn count_phase(stats: &mut IngestStats, phase: IngestPhase) {
        match phase {
            IngestPhase::Backfill => stats.backfilled_comments += 1,
            IngestPhase::Live => stats.live_comments += 1,
        }
    }

    pub async fn get_stats(&self) -> IngestStats {
        self.stats.read().await.clone()
    }

    pub async fn export_metrics(&self) -> Result<String, serde_json::Error> {
        let stats = self.get_stats().await;
        serde_json::to_string_pretty(&stats)
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}
