/// Middleware module
///
/// Request guards and bearer-token authentication.

mod brute_force_middleware;
mod jwt_middleware;
mod rate_limit_middleware;

pub use brute_force_middleware::{BruteForceMiddleware, ClientId};
pub use jwt_middleware::JwtMiddleware;
pub use rate_limit_middleware::RateLimitMiddleware;
