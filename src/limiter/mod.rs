//! Token-bucket admission control for outbound API requests
//!
//! Tokens accrue continuously with elapsed wall-clock time rather than in
//! discrete window ticks, which keeps admission smooth under sustained load
//! instead of bursting at window boundaries.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Mutable bucket state, guarded by the limiter's mutex.
#[derive(Debug)]
struct Bucket {
    /// Fractional token count, `0.0 ..= capacity`
    tokens: f64,
    /// Last refill timestamp
    last_refill: Instant,
}

/// Thread-safe token-bucket rate limiter.
///
/// Shared by every caller of one client instance; each outbound attempt
/// (including retries) consumes one token. Not a process-wide singleton, so
/// independently configured clients coexist safely.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum tokens, also the grant budget per window
    capacity: u32,
    /// Refill window
    window: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter permitting `capacity` requests per `window`.
    ///
    /// The bucket starts full.
    pub fn new(capacity: u32, window: Duration) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        debug_assert!(!window.is_zero(), "window must be positive");

        Self {
            capacity,
            window,
            bucket: Mutex::new(Bucket {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refill tokens proportionally to time elapsed since the last refill.
    ///
    /// Must be called with the bucket lock held.
    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let rate = self.capacity as f64 / self.window.as_secs_f64();

        bucket.tokens = (bucket.tokens + elapsed * rate).min(self.capacity as f64);
        bucket.last_refill = now;
    }

    /// Try to acquire a token without waiting
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Acquire a token, sleeping until one accrues if none is available.
    ///
    /// Returns the total time spent waiting (zero on an immediate grant).
    /// The sleep happens outside the lock so other callers can observe and
    /// acquire in the meantime.
    pub async fn wait_if_needed(&self) -> Duration {
        let start = Instant::now();

        let wait = {
            let mut bucket = self.bucket.lock().await;
            self.refill(&mut bucket);

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return Duration::ZERO;
            }

            // Exact time until one more token accrues
            let rate = self.capacity as f64 / self.window.as_secs_f64();
            Duration::from_secs_f64((1.0 - bucket.tokens) / rate)
        };

        debug!(wait_secs = wait.as_secs_f64(), "rate limited, waiting for token");
        tokio::time::sleep(wait).await;

        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
        }

        start.elapsed()
    }

    /// Floor of the current (refilled) token count.
    ///
    /// Introspection only; never grants.
    pub async fn available_tokens(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens as u32
    }

    /// Refill the bucket to capacity.
    ///
    /// For test harnesses and explicit operator resets; the pipeline never
    /// calls this mid-flight.
    pub async fn reset(&self) {
        let mut bucket = self.bucket.lock().await;
        bucket.tokens = self.capacity as f64;
        bucket.last_refill = Instant::now();
        debug!("rate limiter reset to full capacity");
    }

    /// Configured capacity
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Configured window
    pub fn window(&self) -> Duration {
        self.window
    }
}
