/// JWT Token Codec
///
/// Issues and verifies signed credentials. Each token class is signed with
/// its own HMAC secret, so a leaked access secret cannot mint refresh tokens.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;

use crate::auth::claims::{Claims, TokenClass};
use crate::configuration::JwtSettings;

/// Token codec failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Internal cryptographic failure while signing
    Signing(String),
    /// Signature or algorithm does not check out for the expected class
    InvalidSignature,
    /// `now > exp`
    Expired,
    /// Signature is valid but the class tag is the other class
    ClassMismatch,
    /// Not a decodable JWT at all
    Malformed(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Signing(msg) => write!(f, "token signing failed: {}", msg),
            TokenError::InvalidSignature => write!(f, "invalid token signature"),
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::ClassMismatch => write!(f, "token class mismatch"),
            TokenError::Malformed(msg) => write!(f, "malformed token: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl ClassKeys {
    fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

/// Dual-secret credential codec
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    issuer: String,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Any HMAC variant is accepted; every other family is rejected
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            access: ClassKeys::new(&config.access_token_secret, config.access_token_expiry),
            refresh: ClassKeys::new(&config.refresh_token_secret, config.refresh_token_expiry),
            issuer: config.issuer.clone(),
            validation,
        }
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Lifetime of freshly issued tokens of `class`, in seconds
    pub fn ttl_seconds(&self, class: TokenClass) -> i64 {
        self.keys(class).ttl_seconds
    }

    /// Issue a signed credential for `subject`
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails
    pub fn issue(&self, subject: &str, class: TokenClass) -> Result<String, TokenError> {
        let keys = self.keys(class);
        let claims = Claims::new(subject, class, keys.ttl_seconds, &self.issuer);

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a credential against the secret of `expected` and return its claims
    ///
    /// Signature and expiry are checked first; the class tag is compared only
    /// once the signature is known to be good.
    ///
    /// # Errors
    /// `InvalidSignature`, `Expired`, `ClassMismatch`, or `Malformed`
    pub fn verify(&self, token: &str, expected: TokenClass) -> Result<Claims, TokenError> {
        let keys = self.keys(expected);

        let claims = decode::<Claims>(token, &keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidIssuer => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        if claims.class != expected {
            tracing::warn!(
                expected = %expected,
                actual = %claims.class,
                "Token class mismatch"
            );
            return Err(TokenError::ClassMismatch);
        }

        Ok(claims)
    }
}
