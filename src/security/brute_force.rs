/// Brute-force guard for the authentication endpoints
///
/// Tracks attempts per client identifier independently of the general rate
/// limiter. Reaching `max_attempts` blocks the identifier for the block
/// duration; a blocked identifier is rejected without touching its state.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::configuration::BruteForceSettings;
use crate::error::AppError;
use crate::security::sweeper::{spawn_sweeper, SweeperHandle};

#[derive(Debug, Clone, Copy)]
struct LockoutState {
    count: u32,
    last_attempt: Instant,
    blocked_at: Option<Instant>,
}

pub struct BruteForceGuard {
    attempts: DashMap<String, LockoutState>,
    max_attempts: u32,
    block_duration: Duration,
    stale_after: Duration,
    evict_after: Duration,
    sweep_interval: Duration,
}

impl BruteForceGuard {
    pub fn new(settings: &BruteForceSettings) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts: settings.max_attempts,
            block_duration: Duration::from_secs(settings.block_duration_seconds),
            stale_after: Duration::from_secs(settings.stale_after_seconds),
            evict_after: Duration::from_secs(settings.evict_after_seconds),
            sweep_interval: Duration::from_secs(settings.sweep_interval_seconds),
        }
    }

    /// Count one attempt from `client`
    ///
    /// # Errors
    /// `AppError::TooManyAttempts` while blocked, and on the attempt that
    /// triggers the block
    pub fn record_attempt(&self, client: &str) -> Result<(), AppError> {
        self.record_attempt_at(client, Instant::now())
    }

    pub fn record_attempt_at(&self, client: &str, now: Instant) -> Result<(), AppError> {
        let mut entry = self.attempts.entry(client.to_string()).or_insert(LockoutState {
            count: 0,
            last_attempt: now,
            blocked_at: None,
        });
        let state = entry.value_mut();

        if let Some(blocked_at) = state.blocked_at {
            let blocked_for = now.saturating_duration_since(blocked_at);
            if blocked_for < self.block_duration {
                return Err(AppError::TooManyAttempts {
                    retry_after: self.block_duration - blocked_for,
                });
            }
            // Block served; start over
            state.count = 0;
            state.blocked_at = None;
        }

        if now.saturating_duration_since(state.last_attempt) > self.stale_after {
            state.count = 0;
            state.blocked_at = None;
        }

        state.count = state.count.saturating_add(1);
        state.last_attempt = now;

        if state.count >= self.max_attempts {
            state.blocked_at = Some(now);
            let count = state.count;
            drop(entry);

            tracing::warn!(client = %client, attempts = count, "Client blocked after repeated attempts");
            return Err(AppError::TooManyAttempts {
                retry_after: self.block_duration,
            });
        }

        Ok(())
    }

    /// Forget everything about `client`, e.g. after a successful login
    pub fn reset(&self, client: &str) {
        self.attempts.remove(client);
    }

    pub fn is_blocked_at(&self, client: &str, now: Instant) -> bool {
        self.attempts
            .get(client)
            .and_then(|state| state.blocked_at)
            .map_or(false, |blocked_at| {
                now.saturating_duration_since(blocked_at) < self.block_duration
            })
    }

    /// Evict identifiers idle past the eviction threshold; active blocks stay
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.attempts.len();
        self.attempts.retain(|_, state| {
            let still_blocked = state.blocked_at.map_or(false, |blocked_at| {
                now.saturating_duration_since(blocked_at) < self.block_duration
            });
            still_blocked || now.saturating_duration_since(state.last_attempt) <= self.evict_after
        });
        before.saturating_sub(self.attempts.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.attempts.len()
    }

    pub fn start_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let guard = Arc::clone(self);
        spawn_sweeper("brute_force_guard", self.sweep_interval, move |now| {
            guard.sweep_at(now)
        })
    }
}
