use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A comment as delivered by the feed, before any analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedComment {
    pub id: String,
    pub body: String,
    pub created_utc: i64,
}

impl FeedComment {
    /// UTC calendar day the comment was posted on. Out-of-range timestamps
    /// fall back to the epoch day rather than failing ingestion.
    pub fn created_date(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp(self.created_utc, 0)
            .unwrap_or_default()
            .date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedThread {
    pub id: String,
    pub title: String,
    pub comments: Vec<FeedComment>,
}

/// An analyzed comment: the resolved ticker and the raw sentiment score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(rename = "comment")]
    pub body: String,
    pub ticker: Option<String>,
    #[serde(rename = "sentiment")]
    pub sentiment_score: i8,
}

/// Sentiment on one ticker for one day. `value` is the mean of the raw
/// scores, `confidence` the number of comments that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub ticker: String,
    pub value: f64,
    pub confidence: u32,
}

/// Per-ticker sentiment history. Index 0 is today, each following entry is
/// further in the past. Indices do not necessarily correspond to days.
pub type SentimentMap = HashMap<String, Vec<Sentiment>>;
