//! Integration tests for the health endpoint

mod common;

use async_trait::async_trait;
use common::{spawn_app, spawn_app_with, TestOptions};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokenwarden::accounts::{Account, AccountStore};
use tokenwarden::auth::{RevocationError, RevocationStore};
use tokenwarden::error::{AppError, DatabaseError};
use uuid::Uuid;

/// Revocation store whose backend never answers
struct OfflineStore;

#[async_trait]
impl RevocationStore for OfflineStore {
    async fn revoke(&self, _: &str, _: Duration) -> Result<(), RevocationError> {
        Err(RevocationError::StoreUnavailable("connection refused".to_string()))
    }
    async fn revoke_if_absent(&self, _: &str, _: Duration) -> Result<bool, RevocationError> {
        Err(RevocationError::StoreUnavailable("connection refused".to_string()))
    }
    async fn is_revoked(&self, _: &str) -> Result<bool, RevocationError> {
        Err(RevocationError::StoreUnavailable("connection refused".to_string()))
    }
    async fn unrevoke(&self, _: &str) -> Result<(), RevocationError> {
        Err(RevocationError::StoreUnavailable("connection refused".to_string()))
    }
    async fn ping(&self) -> Result<(), RevocationError> {
        Err(RevocationError::StoreUnavailable("connection refused".to_string()))
    }
}

/// Account store whose database never answers
struct OfflineAccounts;

fn database_down() -> AppError {
    AppError::Database(DatabaseError::ConnectionPool("connection refused".to_string()))
}

#[async_trait]
impl AccountStore for OfflineAccounts {
    async fn find_by_email(&self, _: &str) -> Result<Option<Account>, AppError> {
        Err(database_down())
    }
    async fn find_by_id(&self, _: Uuid) -> Result<Option<Account>, AppError> {
        Err(database_down())
    }
    async fn exists_by_email(&self, _: &str) -> Result<bool, AppError> {
        Err(database_down())
    }
    async fn create(&self, _: &Account) -> Result<(), AppError> {
        Err(database_down())
    }
    async fn ping(&self) -> Result<(), AppError> {
        Err(database_down())
    }
}

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app();

    let response = app.health_check().await;

    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn health_check_reports_unreachable_revocation_store() {
    let app = spawn_app_with(TestOptions {
        revocations: Arc::new(OfflineStore),
        ..TestOptions::default()
    });

    let response = app.health_check().await;

    assert_eq!(503, response.status().as_u16());
}

#[tokio::test]
async fn health_check_reports_unreachable_account_store() {
    let app = spawn_app_with(TestOptions {
        accounts: Arc::new(OfflineAccounts),
        ..TestOptions::default()
    });

    let response = app.health_check().await;

    assert_eq!(503, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn refresh_fails_closed_when_revocation_store_is_down() {
    let app = spawn_app_with(TestOptions {
        revocations: Arc::new(OfflineStore),
        ..TestOptions::default()
    });
    let body = app.registered_login().await;

    let response = app.refresh(&common::token(&body, "refresh_token")).await;

    assert_eq!(500, response.status().as_u16());
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["code"], "INTERNAL_ERROR");
    assert_eq!(error["error"], "Internal server error");
    assert!(error.get("access_token").is_none());
}
