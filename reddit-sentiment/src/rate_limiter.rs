use biggygains_core::CoreError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    /// Requests allowed back to back, also the number allowed in flight.
    pub burst: u32,
}

impl RateLimitConfig {
    /// Reddit's budget for OAuth clients: 100 requests per minute.
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 100,
            time_window: Duration::from_secs(60),
            burst: 10,
        }
    }

    fn refill_per_sec(&self) -> f64 {
        self.max_requests as f64 / self.time_window.as_secs_f64()
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    /// Set after a 429; no token is handed out before it.
    blocked_until: Option<Instant>,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst.max(1) as f64;
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                blocked_until: None,
            }),
            capacity,
            refill_per_sec: config.refill_per_sec(),
        }
    }

    /// Takes one token, or returns how long to wait before trying again.
    pub async fn try_take(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(until) = state.blocked_until {
            if until > now {
                return Err(until - now);
            }
            state.blocked_until = None;
        }

        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64(
                (1.0 - state.tokens) / self.refill_per_sec,
            ))
        }
    }

    pub async fn available(&self) -> f64 {
        let state = self.state.lock().await;
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        (state.tokens + elapsed * self.refill_per_sec).min(self.capacity)
    }

    /// Empties the bucket and holds every caller back for `delay`.
    pub async fn block_for(&self, delay: Duration) {
        let mut state = self.state.lock().await;
        state.tokens = 0.0;
        state.last_refill = Instant::now();
        state.blocked_until = Some(Instant::now() + delay);
    }
}

/// Shared gate in front of every Reddit request.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: TokenBucket,
    in_flight: Arc<Semaphore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: TokenBucket::new(&config),
            in_flight: Arc::new(Semaphore::new(config.burst.max(1) as usize)),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Waits for both an in-flight slot and a token. The slot is held until
    /// the returned permit is dropped.
    pub async fn acquire(&self) -> Result<RequestPermit, CoreError> {
        let started = Instant::now();
        let slot = self
            .in_flight
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal {
                message: "rate limiter closed".to_string(),
            })?;

        while let Err(wait) = self.bucket.try_take().await {
            debug!("Rate limit reached, waiting {:?}", wait);
            sleep(wait).await;
        }

        Ok(RequestPermit {
            _slot: slot,
            waited: started.elapsed(),
        })
    }

    /// Called when Reddit answers 429.
    pub async fn back_off(&self, retry_after: Duration) {
        warn!("Reddit rate limit hit, pausing requests for {:?}", retry_after);
        self.bucket.block_for(retry_after).await;
    }

    pub async fn available_tokens(&self) -> f64 {
        self.bucket.available().await
    }

    pub fn available_slots(&self) -> usize {
        self.in_flight.available_permits()
    }
}

#[derive(Debug)]
pub struct RequestPermit {
    _slot: OwnedSemaphorePermit,
    pub waited: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, secs: u64, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            time_window: Duration::from_secs(secs),
            burst,
        }
    }

    #[tokio::test]
    async fn test_burst_then_wait() {
        let bucket = TokenBucket::new(&config(10, 10, 3));

        for _ in 0..3 {
            assert!(bucket.try_take().await.is_ok());
        }
        let wait = bucket.try_take().await.unwrap_err();
        assert!(wait <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_refill() {
        // 20 tokens per second
        let bucket = TokenBucket::new(&config(1200, 60, 1));

        assert!(bucket.try_take().await.is_ok());
        assert!(bucket.try_take().await.is_err());

        sleep(Duration::from_millis(120)).await;
        assert!(bucket.try_take().await.is_ok());
    }

    #[tokio::test]
    async fn test_block_for_holds_tokens_back() {
        let bucket = TokenBucket::new(&config(100, 60, 10));
        bucket.block_for(Duration::from_secs(30)).await;

        let wait = bucket.try_take().await.unwrap_err();
        assert!(wait > Duration::from_secs(29));
        assert!(bucket.available().await < 1.0);
    }

    #[tokio::test]
    async fn test_permits_limit_in_flight() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());
        assert_eq!(limiter.available_slots(), 10);

        let first = limiter.acquire().await.unwrap();
        let _second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available_slots(), 8);
        assert!(limiter.available_tokens().await <= 8.5);

        drop(first);
        assert_eq!(limiter.available_slots(), 9);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        // 50 tokens per second, burst of one
        let limiter = RateLimiter::new(config(3000, 60, 1));

        limiter.acquire().await.unwrap();
        let permit = limiter.acquire().await.unwrap();
        assert!(permit.waited >= Duration::from_millis(10));
    }
}
