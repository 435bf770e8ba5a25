/// Fixed-window rate limiter
///
/// Counts requests per client identifier. A window opens on the first
/// request and resets once it has been open longer than the configured
/// length. Uses `DashMap` so each check locks only one shard.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::configuration::RateLimitSettings;
use crate::error::AppError;
use crate::security::sweeper::{spawn_sweeper, SweeperHandle};

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    window_start: Instant,
}

pub struct RateLimiter {
    clients: DashMap<String, ClientWindow>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.requests_per_window, settings.window())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request from `client`
    ///
    /// # Errors
    /// `AppError::RateLimited` once the window's budget is spent
    pub fn check(&self, client: &str) -> Result<(), AppError> {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), AppError> {
        let mut entry = self.clients.entry(client.to_string()).or_insert(ClientWindow {
            count: 0,
            window_start: now,
        });
        let state = entry.value_mut();

        if now.saturating_duration_since(state.window_start) > self.window {
            state.count = 0;
            state.window_start = now;
        }

        state.count = state.count.saturating_add(1);
        let count = state.count;
        drop(entry);

        if count > self.limit {
            tracing::warn!(client = %client, count, limit = self.limit, "Rate limit exceeded");
            return Err(AppError::RateLimited {
                retry_after: self.window,
            });
        }

        Ok(())
    }

    /// Drop clients whose window closed more than one window ago
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, state| now.saturating_duration_since(state.window_start) <= self.window);
        before.saturating_sub(self.clients.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Sweep once per window in the background
    pub fn start_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let limiter = Arc::clone(self);
        spawn_sweeper("rate_limiter", self.window, move |now| limiter.sweep_at(now))
    }
}
