/// Request guards
///
/// Per-client rate limiting for all traffic, brute-force lockout for the
/// authentication endpoints, and the background tasks that keep their
/// state bounded.

mod brute_force;
mod client_ip;
mod rate_limit;
mod sweeper;

pub use brute_force::BruteForceGuard;
pub use client_ip::{client_ip, resolve_client_ip};
pub use rate_limit::RateLimiter;
pub use sweeper::{spawn_sweeper, SweeperHandle};
