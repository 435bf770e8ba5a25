/// JWT Claims structure
///
/// Represents the payload of a credential: the subject, the class tag
/// that separates access from refresh tokens, and the standard JWT
/// claims (RFC 7519).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Token class tag
///
/// A token of one class never validates under the other class's check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims shared by both token classes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (account ID as text)
    pub sub: String,
    /// Token class
    #[serde(rename = "type")]
    pub class: TokenClass,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Unique token ID, keeps two tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Create new claims for `subject`
    ///
    /// # Arguments
    /// * `subject` - Account identifier
    /// * `class` - Access or refresh
    /// * `expiry_seconds` - Token lifetime in seconds from now
    /// * `issuer` - Issuer identifier
    pub fn new(subject: &str, class: TokenClass, expiry_seconds: i64, issuer: &str) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject.to_string(),
            class,
            exp: now.saturating_add(expiry_seconds),
            iat: now,
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }

    /// Check if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    /// Time left before the token expires on its own, plus one second of
    /// slack for timestamp truncation. Zero once expired.
    pub fn remaining_lifetime(&self) -> Duration {
        let remaining = self.exp - Utc::now().timestamp();
        if remaining < 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(remaining as u64 + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let subject = Uuid::new_v4().to_string();
        let claims = Claims::new(&subject, TokenClass::Access, 900, "test");

        assert_eq!(claims.sub, subject);
        assert_eq!(claims.class, TokenClass::Access);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.iss, "test");
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_claims_have_unique_ids() {
        let a = Claims::new("subject", TokenClass::Refresh, 60, "test");
        let b = Claims::new("subject", TokenClass::Refresh, 60, "test");

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_class_serializes_as_type_tag() {
        let claims = Claims::new("subject", TokenClass::Refresh, 60, "test");
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["type"], "refresh");
    }

    #[test]
    fn test_remaining_lifetime_covers_expiry() {
        let claims = Claims::new("subject", TokenClass::Refresh, 3600, "test");
        let remaining = claims.remaining_lifetime();

        assert!(remaining >= Duration::from_secs(3600));
        assert!(remaining <= Duration::from_secs(3601));
    }

    #[test]
    fn test_expired_claims() {
        let claims = Claims::new("subject", TokenClass::Access, -120, "test");

        assert!(claims.is_expired());
        assert_eq!(claims.remaining_lifetime(), Duration::ZERO);
        assert!(claims.expires_at() < claims.issued_at());
    }

    #[test]
    fn test_huge_expiry_saturates() {
        let claims = Claims::new("subject", TokenClass::Refresh, i64::MAX, "test");

        assert_eq!(claims.exp, i64::MAX);
        assert!(!claims.is_expired());
    }
}
