//! Text encoding of the rolling window, stored under one datastore key.
//!
//! ```json
//! {
//!   "version": 1,
//!   "history": [{"GME": {"ticker": "GME", "value": 0.5, "confidence": 4}}],
//!   "today": {"date": "2021-02-01", "comments": [{"id": "...", "comment": "...", "ticker": "GME", "sentiment": 1}]}
//! }
//! ```
//!
//! `history` and `today` may be absent; decoding then yields an empty history
//! and a fresh bucket for the supplied current date. A history entry whose
//! `ticker` differs from its key is rejected.

use crate::aggregator::RollingWindow;
use crate::bucket::{Aggregate, DayBucket, TickerStat};
use biggygains_core::{Comment, CoreError, Sentiment, SnapshotError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SNAPSHOT_VERSION: u32 = 1;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotBlob {
    version: u32,
    #[serde(default)]
    history: Vec<BTreeMap<String, Sentiment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    today: Option<TodayRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TodayRecord {
    date: String,
    #[serde(default)]
    comments: Vec<Comment>,
}

pub fn encode(window: &RollingWindow) -> Result<Vec<u8>, CoreError> {
    let history = window
        .history
        .iter()
        .map(|day| {
            day.iter()
                .map(|(ticker, stat)| (ticker.clone(), stat.to_sentiment(ticker)))
                .collect()
        })
        .collect();

    let mut comments: Vec<Comment> = window.today.comments().cloned().collect();
    comments.sort_by(|a, b| a.id.cmp(&b.id));

    let blob = SnapshotBlob {
        version: SNAPSHOT_VERSION,
        history,
        today: Some(TodayRecord {
            date: window.today.date().format(DATE_FORMAT).to_string(),
            comments,
        }),
    };

    Ok(serde_json::to_vec(&blob).map_err(SnapshotError::from)?)
}

/// Parses a blob produced by [`encode`]. `current_date` is used for the active
/// bucket only when the blob carries none.
pub fn decode(raw: &[u8], current_date: NaiveDate) -> Result<RollingWindow, CoreError> {
    let text = std::str::from_utf8(raw).map_err(|_| SnapshotError::InvalidEncoding)?;

    let probe: VersionProbe = serde_json::from_str(text).map_err(SnapshotError::from)?;
    if probe.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            expected: SNAPSHOT_VERSION,
            actual: probe.version,
        }
        .into());
    }

    let blob: SnapshotBlob = serde_json::from_str(text).map_err(SnapshotError::from)?;

    let history = blob
        .history
        .into_iter()
        .map(|day| {
            day.into_iter()
                .map(|(key, sentiment)| {
                    if !sentiment.ticker.eq_ignore_ascii_case(&key) {
                        return Err(SnapshotError::TickerMismatch {
                            key,
                            ticker: sentiment.ticker,
                        });
                    }
                    Ok((
                        key.to_ascii_uppercase(),
                        TickerStat {
                            mean: sentiment.value,
                            count: sentiment.confidence,
                        },
                    ))
                })
                .collect::<Result<Aggregate, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let today = match blob.today {
        Some(record) => {
            let date = NaiveDate::parse_from_str(&record.date, DATE_FORMAT).map_err(|_| {
                SnapshotError::InvalidDate {
                    value: record.date.clone(),
                }
            })?;
            DayBucket::with_comments(date, record.comments)
        }
        None => DayBucket::new(current_date),
    };

    Ok(RollingWindow { today, history })
}
