use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const REDDIT_KEY_ENV: &str = "REDDIT_KEY";
pub const REDDIT_SECRET_ENV: &str = "REDDIT_SECRET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub sentiment: SentimentConfig,
    pub datastore: DatastoreConfig,
    pub scheduler: SchedulerConfig,
    pub tickers: TickerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
    pub subreddits: Vec<String>,
    /// How many of the newest threads are read when there is no saved state.
    pub backfill_thread_limit: u32,
    pub poll_interval_secs: u64,
    pub stream_batch_limit: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: "biggygains/0.1 (ticker sentiment)".to_string(),
            subreddits: vec!["wallstreetbets".to_string()],
            backfill_thread_limit: 10,
            poll_interval_secs: 5,
            stream_batch_limit: 100,
        }
    }
}

impl RedditConfig {
    pub fn credentials(&self) -> Result<(String, String), ConfigError> {
        let client_id = self
            .client_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: REDDIT_KEY_ENV.to_string(),
            })?;
        let client_secret = self
            .client_secret
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: REDDIT_SECRET_ENV.to_string(),
            })?;
        Ok((client_id, client_secret))
    }

    /// Subreddits in the `sub1+sub2` form Reddit listing endpoints accept.
    pub fn subreddit_path(&self) -> String {
        self.subreddits.join("+")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Days kept in the rolling window, the active day included.
    pub max_days: usize,
    pub state_key: String,
    pub scorer: String,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            max_days: 5,
            state_key: "reddit_sentiment_v1".to_string(),
            scorer: "lexicon".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// `sqlite://...` URL; no URL means state lives in memory only.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub update_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub symbols: Vec<String>,
    /// Newline-separated symbol list, merged with `symbols`.
    pub file: Option<String>,
}

impl AppConfig {
    /// Loads the file at `path`, falling back to defaults when it does not
    /// exist, then applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;
            info!("Loading configuration from {}", path.display());
            Self::from_toml_str(&raw)?
        } else {
            info!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Self::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(REDDIT_KEY_ENV) {
            debug!("Reddit client id taken from {}", REDDIT_KEY_ENV);
            self.reddit.client_id = Some(key);
        }
        if let Some(secret) = lookup(REDDIT_SECRET_ENV) {
            debug!("Reddit client secret taken from {}", REDDIT_SECRET_ENV);
            self.reddit.client_secret = Some(secret);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.subreddits.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::MissingField {
                field: "reddit.subreddits".to_string(),
            });
        }
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.user_agent".to_string(),
            });
        }
        if self.reddit.backfill_thread_limit == 0 {
            return Err(invalid("reddit.backfill_thread_limit", "0"));
        }
        if self.reddit.poll_interval_secs == 0 {
            return Err(invalid("reddit.poll_interval_secs", "0"));
        }
        if self.reddit.stream_batch_limit == 0 || self.reddit.stream_batch_limit > 100 {
            return Err(invalid(
                "reddit.stream_batch_limit",
                &self.reddit.stream_batch_limit.to_string(),
            ));
        }
        if self.sentiment.max_days == 0 {
            return Err(invalid("sentiment.max_days", "0"));
        }
        if self.sentiment.state_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "sentiment.state_key".to_string(),
            });
        }
        if self.scheduler.update_interval_secs == 0 {
            return Err(invalid("scheduler.update_interval_secs", "0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
