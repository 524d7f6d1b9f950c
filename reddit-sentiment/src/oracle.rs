use biggygains_core::{CoreError, TickerOracle};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Fixed set of known symbols, e.g. an exchange listing exported to a file.
#[derive(Debug, Clone, Default)]
pub struct StaticTickerList {
    symbols: HashSet<String>,
}

impl StaticTickerList {
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// One symbol per line; blank lines and `#` comments are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let list = Self::from_symbols(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#')),
        );
        info!("Loaded {} tickers from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn extend<I, S>(&mut self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.symbols
            .extend(Self::from_symbols(symbols).symbols.into_iter());
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[async_trait]
impl TickerOracle for StaticTickerList {
    async fn exists(&self, symbol: &str) -> Result<bool, CoreError> {
        Ok(self.symbols.contains(symbol))
    }
}

/// Remembers every answer of the wrapped oracle. Failed lookups are not
/// cached so a later comment can ask again.
pub struct CachedOracle {
    inner: Arc<dyn TickerOracle>,
    cache: RwLock<HashMap<String, bool>>,
}

impl CachedOracle {
    pub fn new(inner: Arc<dyn TickerOracle>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TickerOracle for CachedOracle {
    async fn exists(&self, symbol: &str) -> Result<bool, CoreError> {
        if let Some(known) = self.cache.read().await.get(symbol).copied() {
            return Ok(known);
        }

        let answer = self.inner.exists(symbol).await?;
        debug!("Ticker lookup {} -> {}", symbol, answer);
        self.cache.write().await.insert(symbol.to_string(), answer);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOracle {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TickerOracle for CountingOracle {
        async fn exists(&self, symbol: &str) -> Result<bool, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::TickerLookup {
                    symbol: symbol.to_string(),
                    reason: "offline".to_string(),
                });
            }
            Ok(symbol == "GME")
        }
    }

    #[tokio::test]
    async fn test_static_list_normalizes_symbols() {
        let list = StaticTickerList::from_symbols([" gme", "AMC ", ""]);
        assert_eq!(list.len(), 2);
        assert!(list.exists("GME").await.unwrap());
        assert!(list.exists("AMC").await.unwrap());
        assert!(!list.exists("TSLA").await.unwrap());
    }

    #[tokio::test]
    async fn test_static_list_from_file() {
        let path = std::env::temp_dir().join(format!("tickers_{}.txt", std::process::id()));
        std::fs::write(&path, "# listed symbols\nGME\n\namc\n").unwrap();

        let mut list = StaticTickerList::load(&path).unwrap();
        list.extend(["tsla"]);
        std::fs::remove_file(&path).ok();

        assert_eq!(list.len(), 3);
        assert!(list.exists("AMC").await.unwrap());
        assert!(list.exists("TSLA").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = StaticTickerList::load("/definitely/not/here/tickers.txt");
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_cache_answers_repeat_lookups() {
        let inner = Arc::new(CountingOracle {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let oracle = CachedOracle::new(inner.clone());

        assert!(oracle.exists("GME").await.unwrap());
        assert!(oracle.exists("GME").await.unwrap());
        assert!(!oracle.exists("LOL").await.unwrap());
        assert!(!oracle.exists("LOL").await.unwrap());

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_skips_failures() {
        let inner = Arc::new(CountingOracle {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let oracle = CachedOracle::new(inner.clone());

        assert!(oracle.exists("GME").await.is_err());
        assert!(oracle.exists("GME").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
