//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Inbound message limit for a chat bridge connection
pub const BRIDGE_RATE_LIMIT: u32 = 30; // Max 30 chat events per second

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    input_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self {
            input_limiter: create_limiter(BRIDGE_RATE_LIMIT),
        }
    }

    /// Check if an inbound message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooldown key: one bucket per chatter per command
type CooldownKey = (u64, String);

/// Per-user, per-command cooldown.
///
/// A single-cell quota replenishing once per cooldown period: the first use
/// passes, any repeat inside the period is rejected, and a rejected attempt
/// does not push the next allowed use further out.
pub struct CommandCooldown {
    limiter: DefaultKeyedRateLimiter<CooldownKey>,
}

impl CommandCooldown {
    pub fn new(cooldown: Duration) -> Self {
        // A zero period is not a valid quota; treat it as "practically none".
        let period = cooldown.max(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Returns true (and consumes the slot) when the user may run the command now
    pub fn try_acquire(&self, user_id: u64, command: &str) -> bool {
        self.limiter
            .check_key(&(user_id, command.to_string()))
            .is_ok()
    }

    /// Drop buckets that have fully replenished
    pub fn sweep(&self) {
        self.limiter.retain_recent();
    }
}
