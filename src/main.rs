use anyhow::Context;
use clap::Parser;
use biggygains_core::{AppConfig, Datastore, TickerOracle};
use datastore::{InMemoryDatastore, SqliteDatastore};
use reddit_sentiment::{
    scorer_from_name, CachedOracle, RedditApiClient, RedditCommentFeed, RedditSentimentSource,
    SourceConfig, StaticTickerList,
};
use scheduler::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "biggygains=info,reddit_sentiment=info,scheduler=info,datastore=info";

#[derive(Parser, Debug)]
#[command(name = "biggygains", about = "Reddit ticker sentiment collector", version)]
struct Args {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(env = "BIGGYGAINS_CONFIG", default_value = "biggygains.toml")]
    config: PathBuf,
    /// Reddit application id, overrides the file and REDDIT_KEY.
    #[arg(long)]
    reddit_key: Option<String>,
    /// Reddit application secret, overrides the file and REDDIT_SECRET.
    #[arg(long)]
    reddit_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting Biggy Gains - Reddit ticker sentiment");

    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(key) = args.reddit_key {
        config.reddit.client_id = Some(key);
    }
    if let Some(secret) = args.reddit_secret {
        config.reddit.client_secret = Some(secret);
    }

    let oracle = build_oracle(&config)?;
    let scorer = scorer_from_name(&config.sentiment.scorer)?;
    let store = build_datastore(&config);

    let client = Arc::new(RedditApiClient::new(&config.reddit).context("creating Reddit client")?);
    let feed = Arc::new(RedditCommentFeed::new(client, &config.reddit));

    let reddit = Arc::new(
        RedditSentimentSource::builder()
            .feed(feed)
            .oracle(oracle)
            .scorer(scorer)
            .datastore(store)
            .config(SourceConfig::from_app(&config))
            .build()?,
    );

    let mut scheduler = Scheduler::new(config.scheduler.update_interval());
    scheduler.register(reddit.clone());

    let summary = scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    let stats = reddit.ingest_stats().await;
    tracing::info!(
        "Stopped after {} update rounds: {} comments seen, {} stored, {} untracked, {} late, {} failed",
        summary.update_rounds,
        stats.total_seen(),
        stats.stored,
        stats.untracked,
        stats.late_dropped,
        stats.failed
    );
    match reddit.export_ingest_metrics().await {
        Ok(json) => tracing::info!("Ingest metrics: {}", json),
        Err(e) => tracing::warn!("Could not export ingest metrics: {}", e),
    }

    if summary.active.is_empty() {
        anyhow::bail!("no sentiment source could be started");
    }
    Ok(())
}

fn build_oracle(config: &AppConfig) -> anyhow::Result<Arc<dyn TickerOracle>> {
    let mut list = match &config.tickers.file {
        Some(path) => StaticTickerList::load(path)
            .with_context(|| format!("reading ticker list {}", path))?,
        None => StaticTickerList::default(),
    };
    list.extend(&config.tickers.symbols);

    if list.is_empty() {
        tracing::warn!("Ticker list is empty, no comment will be attributed");
    } else {
        tracing::info!("Tracking {} tickers", list.len());
    }

    Ok(Arc::new(CachedOracle::new(Arc::new(list))))
}

fn build_datastore(config: &AppConfig) -> Arc<dyn Datastore> {
    match &config.datastore.url {
        Some(url) => Arc::new(SqliteDatastore::new(url.clone())),
        None => {
            tracing::warn!("No datastore URL configured, state will not survive a restart");
            Arc::new(InMemoryDatastore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_cli_arguments() {
        let args = Args::try_parse_from([
            "biggygains",
            "/etc/biggygains/prod.toml",
            "--reddit-key",
            "key",
            "--reddit-secret",
            "secret",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/biggygains/prod.toml"));
        assert_eq!(args.reddit_key.as_deref(), Some("key"));
        assert_eq!(args.reddit_secret.as_deref(), Some("secret"));

        assert!(Args::try_parse_from(["biggygains", "--reddit-token", "x"]).is_err());
    }
}
