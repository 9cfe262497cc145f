//! Configuration for the sync engine.

use kinsync_sync_protocol::ConflictPolicy;
use rand::Rng;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Device ID sent with every request.
    pub device_id: String,
    /// Maximum number of dirty records pushed per kind in one cycle.
    pub push_batch_size: usize,
    /// How conflicts are resolved.
    pub conflict_policy: ConflictPolicy,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Timeout applied to every remote call.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            push_batch_size: 100,
            conflict_policy: ConflictPolicy::default(),
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("local-device")
    }
}

/// Backoff between the attempts of [`SyncEngine::sync_with_retry`].
///
/// Attempt `n` (1-based, after the first try) waits
/// `initial_delay * backoff_multiplier^(n-1)`, capped at `max_delay`, plus
/// up to a quarter of that when jitter is on.
///
/// [`SyncEngine::sync_with_retry`]: crate::SyncEngine::sync_with_retry
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of cycles, the first one included.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of any wait, jitter excluded.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub backoff_multiplier: f64,
    /// Spread waits randomly so replicas do not retry in lockstep.
    pub add_jitter: bool,
}

const JITTER_FRACTION: f64 = 0.25;

impl RetryConfig {
    /// Allows `max_attempts` cycles, doubling from 100ms up to 30s.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the cap on waits.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Turns jitter on or off.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Wait before `attempt`; zero for the first try (attempt 0).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(retry) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };

        let growth = self
            .backoff_multiplier
            .powi(i32::try_from(retry).unwrap_or(i32::MAX));
        let delay = (self.initial_delay.as_secs_f64() * growth).min(self.max_delay.as_secs_f64());

        let spread = if self.add_jitter {
            delay * JITTER_FRACTION * rand::thread_rng().gen::<f64>()
        } else {
            0.0
        };
        Duration::from_secs_f64(delay + spread)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
