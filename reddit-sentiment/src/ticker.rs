use biggygains_core::{CoreError, TickerOracle};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

const CANDIDATE_LENGTHS: [usize; 2] = [3, 4];

/// Resolves the single ticker a comment talks about.
///
/// Explicit uppercase mentions win. Only when none of them is a real ticker
/// are the remaining 3-4 letter words tried case-insensitively. Whenever more
/// than one real ticker turns up in a pass, the comment is treated as
/// ambiguous and no ticker is returned.
#[derive(Clone)]
pub struct TickerExtractor {
    oracle: Arc<dyn TickerOracle>,
}

impl TickerExtractor {
    pub fn new(oracle: Arc<dyn TickerOracle>) -> Self {
        Self { oracle }
    }

    pub async fn extract(&self, text: &str) -> Result<Option<String>, CoreError> {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
            .collect();
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        let uppercase: Vec<&str> = words
            .iter()
            .copied()
            .filter(|word| has_candidate_length(word) && is_uppercase_word(word))
            .collect();

        let found = self
            .resolve(uppercase.iter().map(|word| word.to_string()))
            .await?;
        match found.len() {
            0 => {}
            1 => return Ok(found.into_iter().next()),
            _ => {
                debug!("Ambiguous uppercase tickers {:?}, discarding", found);
                return Ok(None);
            }
        }

        let fallback = words
            .iter()
            .filter(|word| has_candidate_length(word) && !uppercase.contains(word))
            .map(|word| word.to_ascii_uppercase());

        let found = self.resolve(fallback).await?;
        if found.len() == 1 {
            Ok(found.into_iter().next())
        } else {
            if found.len() > 1 {
                debug!("Ambiguous fallback tickers {:?}, discarding", found);
            }
            Ok(None)
        }
    }

    /// Distinct candidates the oracle confirms. Each symbol is asked once.
    async fn resolve<I>(&self, candidates: I) -> Result<BTreeSet<String>, CoreError>
    where
        I: IntoIterator<Item = String>,
    {
        let unique: BTreeSet<String> = candidates.into_iter().collect();
        let mut found = BTreeSet::new();
        for symbol in unique {
            if self.oracle.exists(&symbol).await? {
                found.insert(symbol);
            }
        }
        Ok(found)
    }
}

fn has_candidate_length(word: &str) -> bool {
    CANDIDATE_LENGTHS.contains(&word.len())
}

// At least one uppercase letter and no lowercase ones; digits are allowed.
fn is_uppercase_word(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_uppercase()) && !word.chars().any(|c| c.is_ascii_lowercase())
}
