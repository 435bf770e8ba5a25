/// Account Store
///
/// Durable account records keyed by normalized email. The orchestrator only
/// needs lookup, existence, and insert; the storage schema stays here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError>;

    /// Persist a new account
    ///
    /// # Errors
    /// `AppError::Conflict` if the email is already taken
    async fn create(&self, account: &Account) -> Result<(), AppError>;

    /// Reachability check for the health endpoint
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

type AccountRow = (Uuid, String, String, DateTime<Utc>);

fn from_row((id, email, password_hash, created_at): AccountRow) -> Account {
    Account {
        id,
        email,
        password_hash,
        created_at,
    }
}

/// PostgreSQL-backed account store
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create(&self, account: &Account) -> Result<(), AppError> {
        // A unique violation here surfaces as AppError::Conflict
        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Process-local account store for tests and ephemeral instances
#[derive(Default)]
pub struct InMemoryAccountStore {
    by_email: DashMap<String, Account>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        Ok(self.by_email.get(email).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self
            .by_email
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.value().clone()))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.by_email.contains_key(email))
    }

    async fn create(&self, account: &Account) -> Result<(), AppError> {
        match self.by_email.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict("email already registered".to_string())),
            Entry::Vacant(entry) => {
                entry.insert(account.clone());
                Ok(())
            }
        }
    }
}
