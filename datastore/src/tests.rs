use crate::{InMemoryDatastore, SqliteDatastore};
use biggygains_core::{CoreError, Datastore, DatastoreError};
use std::env;

fn temp_db_url() -> String {
    let db_path = env::temp_dir().join(format!("test_biggygains_{}.db", uuid::Uuid::new_v4()));
    format!("sqlite://{}", db_path.display())
}

async fn exercise(store: &dyn Datastore) {
    assert_eq!(store.get("reddit_sentiment_v1").await.unwrap(), None);

    store.put("reddit_sentiment_v1", b"{\"version\":1}").await.unwrap();
    store.put("other", &[0, 159, 146, 150]).await.unwrap();
    assert_eq!(
        store.get("reddit_sentiment_v1").await.unwrap().as_deref(),
        Some(&b"{\"version\":1}"[..])
    );
    assert_eq!(
        store.get("other").await.unwrap(),
        Some(vec![0, 159, 146, 150])
    );

    // overwrite
    store.put("reddit_sentiment_v1", b"{}").await.unwrap();
    assert_eq!(
        store.get("reddit_sentiment_v1").await.unwrap(),
        Some(b"{}".to_vec())
    );

    store.clear().await.unwrap();
    assert_eq!(store.get("other").await.unwrap(), None);
}

#[tokio::test]
async fn test_in_memory_store() {
    let store = InMemoryDatastore::new();
    store.initialize().await.unwrap();
    exercise(&store).await;
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_sqlite_store() {
    let store = SqliteDatastore::new(temp_db_url());
    store.initialize().await.unwrap();
    // initializing twice keeps the same pool
    store.initialize().await.unwrap();
    exercise(&store).await;
}

#[tokio::test]
async fn test_sqlite_survives_reopen() {
    let url = temp_db_url();

    let first = SqliteDatastore::new(url.clone());
    first.initialize().await.unwrap();
    first.put("state", b"saved").await.unwrap();
    drop(first);

    let second = SqliteDatastore::new(url);
    second.initialize().await.unwrap();
    assert_eq!(second.get("state").await.unwrap(), Some(b"saved".to_vec()));
}

#[tokio::test]
async fn test_sqlite_requires_initialize() {
    let store = SqliteDatastore::new(temp_db_url());
    assert!(matches!(
        store.get("state").await,
        Err(CoreError::Datastore(DatastoreError::NotInitialized))
    ));
}

#[tokio::test]
async fn test_sqlite_bad_path() {
    let store = SqliteDatastore::new("sqlite:///definitely/not/a/dir/state.db");
    assert!(matches!(
        store.initialize().await,
        Err(CoreError::Datastore(DatastoreError::ConnectionFailed { .. }))
    ));
}
