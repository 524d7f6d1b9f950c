use async_trait::async_trait;
use biggygains_core::{ConfigError, CoreError, SentimentScorer};
use std::collections::HashSet;
use std::sync::Arc;

const BULLISH_WORDS: &[&str] = &[
    "bull", "bullish", "buy", "buying", "bought", "call", "calls", "long", "moon", "mooning",
    "rocket", "squeeze", "hold", "holding", "hodl", "tendies", "green", "undervalued", "rally",
];

const BEARISH_WORDS: &[&str] = &[
    "bear", "bearish", "sell", "selling", "sold", "put", "puts", "short", "shorting", "dump",
    "dumping", "crash", "tank", "tanking", "red", "overvalued", "bagholder", "bagholding", "drop",
];

/// Keyword tally: -1 when bearish words dominate, 1 when bullish ones do,
/// 0 otherwise.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    bullish: HashSet<String>,
    bearish: HashSet<String>,
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self::with_words(BULLISH_WORDS.iter().copied(), BEARISH_WORDS.iter().copied())
    }

    pub fn with_words<'a, B, N>(bullish: B, bearish: N) -> Self
    where
        B: IntoIterator<Item = &'a str>,
        N: IntoIterator<Item = &'a str>,
    {
        Self {
            bullish: bullish.into_iter().map(str::to_ascii_lowercase).collect(),
            bearish: bearish.into_iter().map(str::to_ascii_lowercase).collect(),
        }
    }

    fn tally(&self, text: &str) -> i64 {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| {
                let word = word.to_ascii_lowercase();
                if self.bullish.contains(&word) {
                    1
                } else if self.bearish.contains(&word) {
                    -1
                } else {
                    0
                }
            })
            .sum()
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    async fn score(&self, text: &str) -> Result<i8, CoreError> {
        Ok(self.tally(text).signum() as i8)
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

/// Scores everything as neutral. Useful to collect mention counts only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralScorer;

#[async_trait]
impl SentimentScorer for NeutralScorer {
    async fn score(&self, _text: &str) -> Result<i8, CoreError> {
        Ok(0)
    }

    fn name(&self) -> &str {
        "neutral"
    }
}

pub fn scorer_from_name(name: &str) -> Result<Arc<dyn SentimentScorer>, CoreError> {
    match name {
        "lexicon" => Ok(Arc::new(LexiconScorer::new())),
        "neutral" => Ok(Arc::new(NeutralScorer)),
        other => Err(ConfigError::InvalidValue {
            field: "sentiment.scorer".to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lexicon_scores() {
        let scorer = LexiconScorer::new();
        assert_eq!(scorer.score("GME to the MOON, buying more").await.unwrap(), 1);
        assert_eq!(scorer.score("AMC is going to crash, sold it all").await.unwrap(), -1);
        assert_eq!(scorer.score("what is the ticker for apple").await.unwrap(), 0);
        // one of each cancels out
        assert_eq!(scorer.score("buy the dip or sell?").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_words() {
        let scorer = LexiconScorer::with_words(["stonks"], ["guh"]);
        assert_eq!(scorer.score("STONKS only go up").await.unwrap(), 1);
        assert_eq!(scorer.score("guh").await.unwrap(), -1);
    }

    #[test]
    fn test_neutral_scorer() {
        let score = tokio_test::block_on(NeutralScorer.score("GME to the moon"));
        assert_eq!(score.unwrap(), 0);
        assert_eq!(NeutralScorer.name(), "neutral");
    }

    #[tokio::test]
    async fn test_scorer_lookup() {
        assert_eq!(scorer_from_name("lexicon").unwrap().name(), "lexicon");
        let neutral = scorer_from_name("neutral").unwrap();
        assert_eq!(neutral.score("to the moon").await.unwrap(), 0);
        assert!(matches!(
            scorer_from_name("vader"),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
