/// Authentication module
///
/// Token codec, password hashing, the revocation store, and the
/// orchestrator that composes them.

mod claims;
mod jwt;
mod password;
mod revocation;
mod service;

pub use claims::{Claims, TokenClass};
pub use jwt::{TokenCodec, TokenError};
pub use password::{hash_password, verify_password};
pub use revocation::{
    hash_token, InMemoryRevocationStore, RedisRevocationStore, RevocationError, RevocationStore,
};
pub use service::{AuthService, Principal, TokenPair};
