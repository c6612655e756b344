// Outbound throttling
//
// Two independent gates: a token bucket every portal request passes
// through, and a poll cache that answers device-list reads from memory
// inside the minimum poll interval.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::state::DeviceState;

/// One token per minute.
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(60);
/// Up to five requests back to back.
pub const DEFAULT_BURST: u32 = 5;
/// Full device-list polls are served from cache for ten minutes.
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);

// ── Token bucket ────────────────────────────────────────────────────

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket shared by every outbound portal call.
///
/// `acquire` suspends until a token is available. Dropping the future
/// (e.g. when a `select!` on a cancellation token wins) abandons the wait
/// without consuming anything.
#[derive(Debug)]
pub struct TokenBucket {
    bucket: tokio::sync::Mutex<Bucket>,
    refill_every: Duration,
    burst: u32,
}

impl TokenBucket {
    pub fn new(refill_every: Duration, burst: u32) -> Self {
        let burst = burst.max(1);
        Self {
            bucket: tokio::sync::Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            refill_every,
            burst,
        }
    }

    /// Wait for and consume one token.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens > 0 {
                    bucket.tokens -= 1;
                    return;
                }
                self.refill_every
                    .saturating_sub(bucket.last_refill.elapsed())
            };
            trace!(wait_ms = wait.as_millis(), "rate limiter empty, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Consume a token if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        if self.refill_every.is_zero() {
            bucket.tokens = self.burst;
            return;
        }
        let now = Instant::now();
        let periods = now.duration_since(bucket.last_refill).as_nanos() / self.refill_every.as_nanos();
        let periods = u32::try_from(periods).unwrap_or(u32::MAX);
        if periods > 0 {
            bucket.tokens = bucket.tokens.saturating_add(periods).min(self.burst);
            bucket.last_refill += self.refill_every * periods.min(self.burst);
        }
        if bucket.tokens >= self.burst {
            // A full bucket does not bank time toward the next token.
            bucket.last_refill = now;
        }
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(DEFAULT_REFILL_INTERVAL, DEFAULT_BURST)
    }
}

// ── Poll cache ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CacheState {
    last_poll: Option<Instant>,
    devices: Vec<DeviceState>,
}

/// Last successful device list plus when it was fetched.
#[derive(Debug)]
pub struct PollCache {
    state: Mutex<CacheState>,
    min_interval: Duration,
}

impl PollCache {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            min_interval,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached list, if it is non-empty and younger than the minimum
    /// interval. An empty cache never satisfies a poll.
    pub fn fresh(&self) -> Option<Vec<DeviceState>> {
        let state = self.lock();
        let last = state.last_poll?;
        (last.elapsed() < self.min_interval && !state.devices.is_empty())
            .then(|| state.devices.clone())
    }

    /// Record the result of a live fetch.
    pub fn store(&self, devices: Vec<DeviceState>) {
        let mut state = self.lock();
        state.devices = devices;
        state.last_poll = Some(Instant::now());
    }

    /// Force the next poll to go live. The cached list is kept for naming.
    pub fn invalidate(&self) {
        self.lock().last_poll = None;
    }

    pub fn last_poll(&self) -> Option<Instant> {
        self.lock().last_poll
    }

    /// Name of a device from the most recent list, if known.
    pub fn name_of(&self, id: crate::state::DeviceId) -> Option<String> {
        self.lock()
            .devices
            .iter()
            .find(|d| d.device_id == id)
            .map(|d| d.name.clone())
            .filter(|n| !n.is_empty())
    }
}

impl Default for PollCache {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_POLL_INTERVAL)
    }
}
