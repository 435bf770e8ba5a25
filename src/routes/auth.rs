/// Authentication Routes
///
/// Thin HTTP adapters over `AuthService`: decode the body, call the
/// orchestrator, shape the response. Errors flow out as `AppError`.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthService, Principal, TokenPair};
use crate::error::{AppError, AuthError};
use crate::middleware::ClientId;
use crate::security::BruteForceGuard;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair response
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Account information response
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

/// POST /auth/register
///
/// # Errors
/// - 400: Invalid email or password rejected by the policy
/// - 409: Email already registered
pub async fn register(
    form: web::Json<CredentialsRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let account = auth.register(&form.email, &form.password).await?;

    Ok(HttpResponse::Created().json(AccountResponse {
        id: account.id.to_string(),
        email: account.email,
        created_at: account.created_at.to_rfc3339(),
    }))
}

/// POST /auth/login
///
/// A successful login clears the client's brute-force counter.
///
/// # Errors
/// - 401: Unknown email or wrong password, with one message for both
pub async fn login(
    form: web::Json<CredentialsRequest>,
    auth: web::Data<AuthService>,
    guard: web::Data<BruteForceGuard>,
    client: web::ReqData<ClientId>,
) -> Result<HttpResponse, AppError> {
    let pair = auth.login(&form.email, &form.password).await?;

    guard.reset(&client.0);

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, auth.access_token_ttl())))
}

/// POST /auth/refresh
///
/// Rotates the refresh token: the presented one is consumed for good.
/// Holding a live refresh token clears the client's brute-force counter.
///
/// # Errors
/// - 401: Invalid, expired, or already consumed refresh token
/// - 500: Revocation store unavailable, no tokens issued
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
    guard: web::Data<BruteForceGuard>,
    client: web::ReqData<ClientId>,
) -> Result<HttpResponse, AppError> {
    let pair = auth.refresh_tokens(&form.refresh_token).await?;

    guard.reset(&client.0);

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, auth.access_token_ttl())))
}

/// POST /auth/logout
///
/// A successful logout clears the client's brute-force counter.
///
/// # Errors
/// - 401: Invalid or already revoked refresh token
pub async fn logout(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
    guard: web::Data<BruteForceGuard>,
    client: web::ReqData<ClientId>,
) -> Result<HttpResponse, AppError> {
    auth.logout(&form.refresh_token).await?;

    guard.reset(&client.0);

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me
pub async fn get_current_account(
    principal: web::ReqData<Principal>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    // A subject that no longer resolves is treated like a bad token
    let id = Uuid::parse_str(&principal.subject)
        .map_err(|_| AppError::Auth(AuthError::TokenInvalid))?;
    let account = auth
        .accounts()
        .find_by_id(id)
        .await?
        .ok_or(AppError::Auth(AuthError::TokenInvalid))?;

    Ok(HttpResponse::Ok().json(AccountResponse {
        id: account.id.to_string(),
        email: account.email,
        created_at: account.created_at.to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::auth::{InMemoryRevocationStore, TokenCodec};
    use crate::configuration::{BruteForceSettings, JwtSettings};
    use crate::middleware::BruteForceMiddleware;
    use crate::validators::PasswordPolicy;
    use actix_web::{test, App};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts events at warn level or above
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn auth_service() -> AuthService {
        let jwt = JwtSettings {
            access_token_secret: "route-test-access-secret-0123456789abcdef".to_string(),
            refresh_token_secret: "route-test-refresh-secret-0123456789abcdef".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "route-test".to_string(),
        };
        AuthService::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryRevocationStore::new()),
            TokenCodec::new(&jwt),
            PasswordPolicy::default(),
            4,
        )
    }

    #[actix_web::test]
    async fn test_rejected_login_is_logged_once() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _default = tracing::subscriber::set_default(subscriber);

        let guard = Arc::new(BruteForceGuard::new(&BruteForceSettings::default()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(auth_service()))
                .app_data(web::Data::from(guard.clone()))
                .service(
                    web::scope("/auth")
                        .wrap(BruteForceMiddleware::new(guard, false))
                        .route("/login", web::post().to(login)),
                ),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({
                "email": "nobody@example.com",
                "password": "Teste@7890Ab"
            }))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), actix_web::http::StatusCode::UNAUTHORIZED);
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }
}
