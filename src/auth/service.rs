/// Authentication orchestrator
///
/// Sequences the account store, token codec and revocation store into the
/// register / login / refresh / logout / validate operations and decides how
/// each failure is classified.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::accounts::{Account, AccountStore};
use crate::auth::claims::TokenClass;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::revocation::RevocationStore;
use crate::error::{AppError, AuthError};
use crate::validators::{is_valid_email, normalize_email, PasswordPolicy};

/// Access + refresh credentials handed to the client
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity established by a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    revocations: Arc<dyn RevocationStore>,
    codec: TokenCodec,
    policy: PasswordPolicy,
    bcrypt_cost: u32,
    /// Hash verified against when the email is unknown, so both login
    /// failures cost one bcrypt verification
    dummy_hash: OnceCell<String>,
}

const DUMMY_PASSWORD: &str = "tokenwarden-dummy-password";

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        revocations: Arc<dyn RevocationStore>,
        codec: TokenCodec,
        policy: PasswordPolicy,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            accounts,
            revocations,
            codec,
            policy,
            bcrypt_cost,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }

    /// Seconds until a freshly issued access token expires
    pub fn access_token_ttl(&self) -> i64 {
        self.codec.ttl_seconds(TokenClass::Access)
    }

    /// Create an account. No tokens are issued.
    ///
    /// # Errors
    /// - `Validation` for a malformed email or a password the policy rejects
    /// - `Conflict` if the email is already registered
    pub async fn register(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let email = is_valid_email(email)?;
        self.policy.validate(password)?;

        if self.accounts.exists_by_email(&email).await? {
            return Err(AppError::Conflict("email already registered".to_string()));
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

        // create() still reports Conflict if a concurrent registration won
        let account = Account::new(email, password_hash);
        self.accounts.create(&account).await?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    /// Exchange email and password for a token pair
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let email = normalize_email(email);

        let account = self.accounts.find_by_email(&email).await?;
        let stored_hash = match &account {
            Some(account) => account.password_hash.clone(),
            None => self.dummy_hash().await?.to_string(),
        };
        let password_valid = verify_in_background(password, stored_hash).await?;

        let account = match account {
            Some(account) if password_valid => account,
            Some(account) => {
                tracing::info!(account_id = %account.id, "Login failed: wrong password");
                return Err(AppError::Auth(AuthError::InvalidCredentials));
            }
            None => {
                tracing::info!("Login failed: unknown email");
                return Err(AppError::Auth(AuthError::InvalidCredentials));
            }
        };

        let pair = self.issue_pair(&account.id.to_string())?;
        tracing::info!(account_id = %account.id, "Account logged in");
        Ok(pair)
    }

    /// Consume a refresh token and return a fresh pair for the same subject
    ///
    /// The presented token is revoked before anything is issued. If the
    /// revocation write fails, no pair is returned.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.codec.verify(refresh_token, TokenClass::Refresh)?;

        let newly_revoked = self
            .revocations
            .revoke_if_absent(refresh_token, claims.remaining_lifetime())
            .await?;
        if !newly_revoked {
            tracing::warn!(subject = %claims.sub, "Replay of a consumed refresh token");
            return Err(AppError::Auth(AuthError::TokenRevoked));
        }

        let pair = self.issue_pair(&claims.sub)?;
        tracing::info!(subject = %claims.sub, "Refresh token rotated");
        Ok(pair)
    }

    /// Verify an access token. The revocation store is not consulted.
    pub fn validate_access_token(&self, access_token: &str) -> Result<Principal, AppError> {
        let claims = self.codec.verify(access_token, TokenClass::Access)?;

        Ok(Principal {
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
            subject: claims.sub,
        })
    }

    /// Revoke a refresh token so it can never be rotated
    ///
    /// A second logout with the same token fails with `Unauthorized`.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let claims = self.codec.verify(refresh_token, TokenClass::Refresh)?;

        let newly_revoked = self
            .revocations
            .revoke_if_absent(refresh_token, claims.remaining_lifetime())
            .await?;
        if !newly_revoked {
            return Err(AppError::Auth(AuthError::TokenRevoked));
        }

        tracing::info!(subject = %claims.sub, "Logged out");
        Ok(())
    }

    /// Ping the revocation store for the health endpoint
    pub async fn check_revocation_store(&self) -> Result<(), AppError> {
        self.revocations.ping().await.map_err(AppError::from)
    }

    /// Ping the account store for the health endpoint
    pub async fn check_account_store(&self) -> Result<(), AppError> {
        self.accounts.ping().await
    }

    /// Hash of a fixed password at the configured cost, computed once
    async fn dummy_hash(&self) -> Result<&str, AppError> {
        let cost = self.bcrypt_cost;
        let hash = self
            .dummy_hash
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || hash_password(DUMMY_PASSWORD, cost))
                    .await
                    .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))
                    .and_then(|hashed| hashed)
            })
            .await?;
        Ok(hash.as_str())
    }

    fn issue_pair(&self, subject: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.codec.issue(subject, TokenClass::Access)?,
            refresh_token: self.codec.issue(subject, TokenClass::Refresh)?,
        })
    }
}

async fn verify_in_background(password: &str, stored_hash: String) -> Result<bool, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
}
