/// Revocation Store
///
/// Records refresh tokens that must no longer be accepted even though their
/// signature and expiry still check out. Tokens are never stored in
/// plaintext: the key is the SHA-256 fingerprint of the token string.
///
/// Every entry carries a TTL of at least the token's remaining lifetime, so
/// it cannot disappear while the token itself would still verify.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{Duration, Instant};

const KEY_PREFIX: &str = "revoked:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationError {
    /// Backend could not be reached or rejected the command
    StoreUnavailable(String),
}

impl fmt::Display for RevocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationError::StoreUnavailable(msg) => {
                write!(f, "revocation store unavailable: {}", msg)
            }
        }
    }
}

impl std::error::Error for RevocationError {}

/// Expiring set of revoked tokens
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark `token` as revoked for `ttl`. Overwrites any existing entry.
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), RevocationError>;

    /// Mark `token` as revoked only if it is not already.
    ///
    /// Returns `true` when this call created the entry. Of two concurrent
    /// callers presenting the same token, at most one sees `true`.
    async fn revoke_if_absent(&self, token: &str, ttl: Duration) -> Result<bool, RevocationError>;

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError>;

    /// Administrative removal of an entry
    async fn unrevoke(&self, token: &str) -> Result<(), RevocationError>;

    /// Reachability check for the health endpoint
    async fn ping(&self) -> Result<(), RevocationError> {
        Ok(())
    }
}

/// Hash a token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn revocation_key(token: &str) -> String {
    format!("{}{}", KEY_PREFIX, hash_token(token))
}

/// Whole seconds for `SET ... EX`, rounded up; Redis rejects zero
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

/// Redis-backed store for multi-instance deployments
#[derive(Clone)]
pub struct RedisRevocationStore {
    manager: ConnectionManager,
}

impl RedisRevocationStore {
    /// Open a managed connection to `redis_url`
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the URL is invalid or the server is unreachable
    pub async fn connect(redis_url: &str) -> Result<Self, RevocationError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RevocationError::StoreUnavailable(format!("invalid redis url: {}", e)))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| RevocationError::StoreUnavailable(e.to_string()))?;

        tracing::info!("Connected to revocation store");
        Ok(Self { manager })
    }
}

fn unavailable(e: redis::RedisError) -> RevocationError {
    tracing::error!(error = %e, "Revocation store command failed");
    RevocationError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), RevocationError> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(revocation_key(token), 1, ttl_secs(ttl))
            .await
            .map_err(unavailable)
    }

    async fn revoke_if_absent(&self, token: &str, ttl: Duration) -> Result<bool, RevocationError> {
        let mut conn = self.manager.clone();

        // SET NX replies OK on insert and nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(revocation_key(token))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        Ok(reply.is_some())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        let mut conn = self.manager.clone();
        conn.exists(revocation_key(token)).await.map_err(unavailable)
    }

    async fn unrevoke(&self, token: &str) -> Result<(), RevocationError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(revocation_key(token))
            .await
            .map_err(unavailable)
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(RevocationError::StoreUnavailable(format!(
                "unexpected PING response '{}'",
                response
            )))
        }
    }
}

/// Process-local store for tests and single-instance deployments
///
/// Expired entries read as absent; `purge_expired` reclaims them.
#[derive(Default)]
pub struct InMemoryRevocationStore {
    entries: DashMap<String, Instant>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn revoke_at(&self, token: &str, ttl: Duration, now: Instant) {
        self.entries.insert(revocation_key(token), now + ttl);
    }

    fn revoke_if_absent_at(&self, token: &str, ttl: Duration, now: Instant) -> bool {
        match self.entries.entry(revocation_key(token)) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return false;
                }
                entry.insert(now + ttl);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now + ttl);
                true
            }
        }
    }

    fn is_revoked_at(&self, token: &str, now: Instant) -> bool {
        self.entries
            .get(&revocation_key(token))
            .map_or(false, |expires_at| *expires_at > now)
    }

    /// Drop entries whose TTL has passed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), RevocationError> {
        self.revoke_at(token, ttl, Instant::now());
        Ok(())
    }

    async fn revoke_if_absent(&self, token: &str, ttl: Duration) -> Result<bool, RevocationError> {
        Ok(self.revoke_if_absent_at(token, ttl, Instant::now()))
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        Ok(self.is_revoked_at(token, Instant::now()))
    }

    async fn unrevoke(&self, token: &str) -> Result<(), RevocationError> {
        self.entries.remove(&revocation_key(token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("some.jwt.token");
        let hash2 = hash_token("some.jwt.token");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, "some.jwt.token");
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_keys() {
        assert_ne!(revocation_key("token-a"), revocation_key("token-b"));
        assert!(revocation_key("token-a").starts_with("revoked:"));
    }

    #[test]
    fn test_ttl_secs_rounds_up_and_never_zero() {
        assert_eq!(ttl_secs(Duration::from_secs(10)), 10);
        assert_eq!(ttl_secs(Duration::from_millis(10_200)), 11);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_revoke_then_is_revoked() {
        let store = InMemoryRevocationStore::new();

        assert!(!store.is_revoked("token").await.unwrap());
        store.revoke("token", HOUR).await.unwrap();
        assert!(store.is_revoked("token").await.unwrap());
        assert!(!store.is_revoked("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = InMemoryRevocationStore::new();

        store.revoke("token", HOUR).await.unwrap();
        store.revoke("token", HOUR).await.unwrap();

        assert!(store.is_revoked("token").await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_if_absent_only_succeeds_once() {
        let store = InMemoryRevocationStore::new();

        assert!(store.revoke_if_absent("token", HOUR).await.unwrap());
        assert!(!store.revoke_if_absent("token", HOUR).await.unwrap());
        assert!(store.is_revoked("token").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_revoke_if_absent_has_single_winner() {
        let store = Arc::new(InMemoryRevocationStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.revoke_if_absent("token", HOUR).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_unrevoke() {
        let store = InMemoryRevocationStore::new();

        store.revoke("token", HOUR).await.unwrap();
        store.unrevoke("token").await.unwrap();

        assert!(!store.is_revoked("token").await.unwrap());
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let store = InMemoryRevocationStore::new();
        let now = Instant::now();

        store.revoke_at("token", Duration::from_secs(10), now);

        assert!(store.is_revoked_at("token", now + Duration::from_secs(9)));
        assert!(!store.is_revoked_at("token", now + Duration::from_secs(11)));
    }

    #[test]
    fn test_expired_entry_can_be_revoked_again() {
        let store = InMemoryRevocationStore::new();
        let now = Instant::now();

        assert!(store.revoke_if_absent_at("token", Duration::from_secs(10), now));
        assert!(store.revoke_if_absent_at(
            "token",
            Duration::from_secs(10),
            now + Duration::from_secs(11)
        ));
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemoryRevocationStore::new();
        let now = Instant::now();

        store.revoke_at("short", Duration::from_secs(10), now);
        store.revoke_at("long", HOUR, now);

        let removed = store.purge_expired(now + Duration::from_secs(60));

        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.is_revoked_at("long", now + Duration::from_secs(60)));
    }
}
