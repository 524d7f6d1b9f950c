use biggygains_core::{
    ConfigError, CoreError, DatastoreError, ErrorExt, RedditApiError, ScoringError,
    SnapshotError,
};

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let ds_error = CoreError::Datastore(DatastoreError::NotInitialized);
    assert_eq!(ds_error.error_code(), "DATASTORE");

    let scoring_error = CoreError::Scoring(ScoringError::OutOfRange { score: 3 });
    assert_eq!(scoring_error.error_code(), "SCORING");

    let snapshot_error = CoreError::Snapshot(SnapshotError::InvalidEncoding);
    assert_eq!(snapshot_error.error_code(), "SNAPSHOT");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "reddit.subreddits".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_fatal_errors() {
    let closed = CoreError::RedditApi(RedditApiError::StreamClosed {
        reason: "eof".to_string(),
    });
    assert!(closed.is_fatal());

    let forbidden = CoreError::RedditApi(RedditApiError::Forbidden {
        resource: "/r/private/comments".to_string(),
    });
    assert!(forbidden.is_fatal());

    let rate_limited = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(!rate_limited.is_fatal());

    let scoring = CoreError::Scoring(ScoringError::OutOfRange { score: -4 });
    assert!(!scoring.is_fatal());

    let lookup = CoreError::TickerLookup {
        symbol: "GME".to_string(),
        reason: "timeout".to_string(),
    };
    assert!(!lookup.is_fatal());

    let mismatch = CoreError::Snapshot(SnapshotError::TickerMismatch {
        key: "GME".to_string(),
        ticker: "AMC".to_string(),
    });
    assert!(!mismatch.is_fatal());
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "sentiment.state_key".to_string(),
    });
    assert!(config_error
        .user_friendly_message()
        .contains("sentiment.state_key"));

    let snapshot_error = CoreError::Snapshot(SnapshotError::UnsupportedVersion {
        expected: 1,
        actual: 7,
    });
    assert!(snapshot_error.user_friendly_message().contains("rebuilt"));

    let scoring_error = CoreError::Scoring(ScoringError::OutOfRange { score: 9 });
    assert!(scoring_error.user_friendly_message().contains('9'));
}

#[test]
fn test_logging_returns_the_error() {
    let error = CoreError::RedditApi(RedditApiError::StreamClosed {
        reason: "subscription dropped".to_string(),
    });

    assert_eq!(error.log_error().error_code(), "REDDIT_API");
    assert_eq!(error.log_warn().error_code(), "REDDIT_API");
}
