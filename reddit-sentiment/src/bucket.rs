use biggygains_core::{Comment, Sentiment};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerStat {
    pub mean: f64,
    pub count: u32,
}

impl TickerStat {
    pub fn to_sentiment(&self, ticker: &str) -> Sentiment {
        Sentiment {
            ticker: ticker.to_string(),
            value: self.mean,
            confidence: self.count,
        }
    }
}

/// Summary of one day: mean score and sample count per ticker.
pub type Aggregate = BTreeMap<String, TickerStat>;

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// Stored in the current day (new id or overwrite of a known one).
    Stored,
    /// The comment opened a new day; carries the summary of the day it closed.
    Rotated(Aggregate),
    /// The comment is older than the current day and was dropped.
    Late,
}

/// Comments of a single day, unique by id.
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    date: NaiveDate,
    comments: HashMap<String, Comment>,
}

impl DayBucket {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            comments: HashMap::new(),
        }
    }

    pub fn with_comments<I>(date: NaiveDate, comments: I) -> Self
    where
        I: IntoIterator<Item = Comment>,
    {
        let mut bucket = Self::new(date);
        for comment in comments {
            bucket.upsert(comment);
        }
        bucket
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.get(id)
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.values()
    }

    pub fn add(&mut self, date: NaiveDate, comment: Comment) -> AddOutcome {
        if date == self.date {
            self.upsert(comment);
            AddOutcome::Stored
        } else if date > self.date {
            info!(
                "Comment {} opens {}, closing {} with {} comments",
                comment.id,
                date,
                self.date,
                self.comments.len()
            );
            let closed = self.aggregate();
            *self = Self::with_comments(date, [comment]);
            AddOutcome::Rotated(closed)
        } else {
            debug!(
                "Dropping late comment {} from {} (current day {})",
                comment.id, date, self.date
            );
            AddOutcome::Late
        }
    }

    /// Mean score and count per ticker. Comments without a ticker are left out.
    pub fn aggregate(&self) -> Aggregate {
        let mut totals: BTreeMap<&str, (i64, u32)> = BTreeMap::new();
        for comment in self.comments.values() {
            if let Some(ticker) = comment.ticker.as_deref() {
                let entry = totals.entry(ticker).or_insert((0, 0));
                entry.0 += i64::from(comment.sentiment_score);
                entry.1 += 1;
            }
        }

        totals
            .into_iter()
            .map(|(ticker, (sum, count))| {
                (
                    ticker.to_string(),
                    TickerStat {
                        mean: sum as f64 / f64::from(count),
                        count,
                    },
                )
            })
            .collect()
    }

    fn upsert(&mut self, mut comment: Comment) {
        if let Some(ticker) = comment.ticker.as_mut() {
            ticker.make_ascii_uppercase();
        }
        self.comments.insert(comment.id.clone(), comment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 2, d).unwrap()
    }

    fn comment(id: &str, ticker: Option<&str>, score: i8) -> Comment {
        Comment {
            id: id.to_string(),
            body: format!("comment {}", id),
            ticker: ticker.map(str::to_string),
            sentiment_score: score,
        }
    }

    #[test]
    fn test_aggregate_mean_and_count() {
        let mut bucket = DayBucket::new(day(1));
        bucket.add(day(1), comment("a", Some("GME"), 1));
        bucket.add(day(1), comment("b", Some("GME"), 1));
        bucket.add(day(1), comment("c", Some("GME"), -1));
        bucket.add(day(1), comment("d", Some("AMC"), -1));

        let aggregate = bucket.aggregate();
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate["GME"].count, 3);
        assert!((aggregate["GME"].mean - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(aggregate["AMC"], TickerStat { mean: -1.0, count: 1 });
    }

    #[test]
    fn test_reinsert_same_id_overwrites() {
        let mut bucket = DayBucket::new(day(1));
        assert_eq!(bucket.add(day(1), comment("a", Some("GME"), 1)), AddOutcome::Stored);
        assert_eq!(bucket.add(day(1), comment("a", Some("GME"), -1)), AddOutcome::Stored);

        assert_eq!(bucket.len(), 1);
        let aggregate = bucket.aggregate();
        assert_eq!(aggregate["GME"], TickerStat { mean: -1.0, count: 1 });
    }

    #[test]
    fn test_rotation_returns_previous_day() {
        let mut bucket = DayBucket::new(day(1));
        bucket.add(day(1), comment("a", Some("GME"), 1));
        bucket.add(day(1), comment("b", Some("TSLA"), -1));
        let expected = bucket.aggregate();

        let outcome = bucket.add(day(2), comment("c", Some("AMC"), 1));

        assert_eq!(outcome, AddOutcome::Rotated(expected));
        assert_eq!(bucket.date(), day(2));
        assert_eq!(bucket.len(), 1);
        assert!(bucket.get("c").is_some());
    }

    #[test]
    fn test_late_comment_is_dropped() {
        let mut bucket = DayBucket::new(day(2));
        bucket.add(day(2), comment("a", Some("GME"), 1));

        let outcome = bucket.add(day(1), comment("old", Some("GME"), -1));

        assert_eq!(outcome, AddOutcome::Late);
        assert_eq!(bucket.date(), day(2));
        assert!(bucket.get("old").is_none());
        assert_eq!(bucket.aggregate()["GME"].count, 1);
    }

    #[test]
    fn test_comments_without_ticker_are_not_aggregated() {
        let bucket = DayBucket::with_comments(
            day(1),
            [comment("a", None, 1), comment("b", Some("gme"), 1)],
        );

        let aggregate = bucket.aggregate();
        assert_eq!(bucket.len(), 2);
        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate["GME"].count, 1);
    }

    #[test]
    fn test_empty_bucket_rotation_yields_empty_aggregate() {
        let mut bucket = DayBucket::new(day(1));
        let outcome = bucket.add(day(3), comment("a", Some("GME"), 0));
        assert_eq!(outcome, AddOutcome::Rotated(Aggregate::new()));
        assert_eq!(bucket.date(), day(3));
    }
}
