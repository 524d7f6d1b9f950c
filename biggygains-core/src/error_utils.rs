use crate::error::*;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    /// True when the failing component cannot make progress by moving on to
    /// the next item; a comment stream yielding such an error is finished.
    fn is_fatal(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Datastore(e) => {
                error!("Datastore error details: {:?}", e);
            }
            CoreError::Snapshot(e) => {
                error!("Snapshot error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_fatal(),
            CoreError::Datastore(e) => e.is_fatal(),
            CoreError::Scoring(e) => e.is_fatal(),
            CoreError::Config(_) => true,
            CoreError::Internal { .. } => true,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Datastore(e) => e.user_friendly_message(),
            CoreError::Scoring(e) => e.user_friendly_message(),
            CoreError::Snapshot(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { .. } => {
                "Invalid input provided. Please check your input and try again.".to_string()
            }
            CoreError::TickerLookup { symbol, .. } => {
                format!("Could not verify ticker {}.", symbol)
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::Datastore(_) => "DATASTORE".to_string(),
            CoreError::Scoring(_) => "SCORING".to_string(),
            CoreError::Snapshot(_) => "SNAPSHOT".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::TickerLookup { .. } => "TICKER_LOOKUP".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            RedditApiError::AuthenticationFailed { .. }
                | RedditApiError::InvalidToken
                | RedditApiError::Forbidden { .. }
                | RedditApiError::SubredditNotFound { .. }
                | RedditApiError::StreamClosed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit authentication failed. Please check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Reddit asked to wait {} seconds.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. You may not have permission to view this content.",
                resource
            ),
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit '{}' not found or is private.", subreddit)
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid. Please re-authenticate.".to_string()
            }
            RedditApiError::RequestTimeout => "Request to Reddit timed out.".to_string(),
            RedditApiError::StreamClosed { .. } => {
                "The Reddit comment stream stopped. Sentiment data is no longer updating."
                    .to_string()
            }
            _ => "Reddit API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
            RedditApiError::StreamClosed { .. } => "REDDIT_STREAM_CLOSED".to_string(),
        }
    }
}

impl ErrorExt for DatastoreError {
    fn log_error(&self) -> &Self {
        error!("DatastoreError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DatastoreError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            DatastoreError::NotInitialized | DatastoreError::MigrationFailed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatastoreError::NotInitialized => {
                "Datastore was used before it was initialized.".to_string()
            }
            DatastoreError::ConnectionFailed { .. } => {
                "Datastore connection failed. Saved state is unavailable.".to_string()
            }
            _ => "Datastore error occurred. Saved state may be stale.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DatastoreError::NotInitialized => "DS_NOT_INITIALIZED".to_string(),
            DatastoreError::ConnectionFailed { .. } => "DS_CONNECTION_FAILED".to_string(),
            DatastoreError::MigrationFailed { .. } => "DS_MIGRATION_FAILED".to_string(),
            DatastoreError::Sql(_) => "DS_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ScoringError {
    fn log_error(&self) -> &Self {
        error!("ScoringError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ScoringError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ScoringError::OutOfRange { score } => {
                format!("Sentiment scorer produced an unusable score: {}", score)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ScoringError::OutOfRange { .. } => "SCORE_OUT_OF_RANGE".to_string(),
        }
    }
}

impl ErrorExt for SnapshotError {
    fn log_error(&self) -> &Self {
        error!("SnapshotError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("SnapshotError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SnapshotError::UnsupportedVersion { .. } => {
                "Saved sentiment state is from an incompatible version and will be rebuilt."
                    .to_string()
            }
            _ => "Saved sentiment state is unreadable and will be rebuilt.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            SnapshotError::UnsupportedVersion { .. } => "SNAPSHOT_VERSION".to_string(),
            SnapshotError::InvalidEncoding => "SNAPSHOT_ENCODING".to_string(),
            SnapshotError::Malformed(_) => "SNAPSHOT_MALFORMED".to_string(),
            SnapshotError::InvalidDate { .. } => "SNAPSHOT_INVALID_DATE".to_string(),
            SnapshotError::TickerMismatch { .. } => "SNAPSHOT_TICKER_MISMATCH".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_fatal(&self) -> bool {
        true
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => {
                "Configuration file not found. Please check the path.".to_string()
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}
