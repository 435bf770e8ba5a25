/// Error Handling Module
///
/// One error type flows through every layer of the service:
/// 1. Domain-specific error enums (validation, account store, auth, config)
/// 2. A unified `AppError` used for control flow (`Result<T, AppError>` + `?`)
/// 3. A single translation layer (`ResponseError for AppError`) that maps
///    error kinds to HTTP status codes and `{error, code}` bodies
/// 4. Structured server-side logging, so detail never reaches the caller

use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::auth::{RevocationError, TokenError};

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
    MalformedBody(String),
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecialCharacter,
    DisallowedSubstring,
    RepeatedCharacters(usize),
    TooFewUniqueCharacters(usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::MalformedBody(detail) => {
                write!(f, "request body is invalid: {}", detail)
            }
            ValidationError::MissingUppercase => {
                write!(f, "password must contain at least one uppercase letter")
            }
            ValidationError::MissingLowercase => {
                write!(f, "password must contain at least one lowercase letter")
            }
            ValidationError::MissingDigit => {
                write!(f, "password must contain at least one digit")
            }
            ValidationError::MissingSpecialCharacter => {
                write!(f, "password must contain at least one special character")
            }
            ValidationError::DisallowedSubstring => {
                write!(f, "password contains a disallowed sequence")
            }
            ValidationError::RepeatedCharacters(max) => write!(
                f,
                "password must not repeat the same character more than {} times in a row",
                max
            ),
            ValidationError::TooFewUniqueCharacters(min) => write!(
                f,
                "password must contain at least {} unique characters",
                min
            ),
        }
    }
}

impl StdError for ValidationError {}

/// Account store errors
#[derive(Debug)]
pub enum DatabaseError {
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Configuration errors
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// Authentication errors
///
/// The variants exist for server-side logs only. Responses collapse them
/// into two generic messages so callers cannot tell which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    TokenInvalid,
    TokenExpired,
    TokenRevoked,
    MissingToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::TokenInvalid => write!(f, "Invalid token"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenRevoked => write!(f, "Token has been revoked"),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Conflict(String),
    Database(DatabaseError),
    Auth(AuthError),
    RateLimited { retry_after: Duration },
    TooManyAttempts { retry_after: Duration },
    StoreUnavailable(String),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::RateLimited { retry_after } => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after_secs(*retry_after))
            }
            AppError::TooManyAttempts { retry_after } => write!(
                f,
                "Too many authentication attempts, retry after {}s",
                retry_after_secs(*retry_after)
            ),
            AppError::StoreUnavailable(msg) => write!(f, "Revocation store unavailable: {}", msg),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

/// Whole seconds for a `Retry-After` hint, rounded up and never zero
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

// ============================================================================
// FROM IMPLEMENTATIONS (Control Flow Error Conversion)
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Internal(format!("Token signing failed: {}", msg)),
            TokenError::Expired => AppError::Auth(AuthError::TokenExpired),
            TokenError::InvalidSignature | TokenError::ClassMismatch | TokenError::Malformed(_) => {
                AppError::Auth(AuthError::TokenInvalid)
            }
        }
    }
}

impl From<RevocationError> for AppError {
    fn from(err: RevocationError) -> Self {
        match err {
            RevocationError::StoreUnavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}

/// Postgres SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let is_unique_violation = err
            .as_database_error()
            .and_then(|db| db.code().map(|code| code == UNIQUE_VIOLATION))
            .unwrap_or(false);

        if is_unique_violation {
            return AppError::Conflict("email already registered".to_string());
        }

        let message = err.to_string();
        match err {
            sqlx::Error::RowNotFound => {
                AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Database(DatabaseError::ConnectionPool(message))
            }
            sqlx::Error::Database(_) => {
                AppError::Database(DatabaseError::QueryExecution(message))
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(message)),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error body returned to callers
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: String, code: String, status: u16) -> Self {
        Self {
            error,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                e.to_string(),
            ),

            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            AppError::Database(DatabaseError::ConnectionPool(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Service temporarily unavailable".to_string(),
            ),

            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid email or password".to_string(),
                ),
                AuthError::TokenInvalid | AuthError::TokenExpired | AuthError::TokenRevoked => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token".to_string(),
                ),
                AuthError::MissingToken => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Missing authentication token".to_string(),
                ),
            },

            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests".to_string(),
            ),

            AppError::TooManyAttempts { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "TOO_MANY_ATTEMPTS",
                "Too many authentication attempts".to_string(),
            ),

            // Infrastructure failures never leak their detail
            AppError::Database(_)
            | AppError::StoreUnavailable(_)
            | AppError::Config(_)
            | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        (
            status,
            ErrorResponse::new(message, code.to_string(), status.as_u16()),
        )
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Conflict(msg) => {
                tracing::warn!(request_id = request_id, error = %msg, "Conflicting resource");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::RateLimited { .. } | AppError::TooManyAttempts { .. } => {
                tracing::warn!(request_id = request_id, error = %self, "Request throttled");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::StoreUnavailable(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Revocation store error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

/// The single place where error kinds become HTTP responses
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self);

        let mut response = HttpResponse::build(status);
        match self {
            AppError::RateLimited { retry_after } | AppError::TooManyAttempts { retry_after } => {
                response.insert_header((
                    header::RETRY_AFTER,
                    retry_after_secs(*retry_after).to_string(),
                ));
            }
            _ => {}
        }
        response.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } | AppError::TooManyAttempts { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::Database(DatabaseError::ConnectionPool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_)
            | AppError::StoreUnavailable(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_app_error_conversion() {
        let val_err = ValidationError::InvalidFormat("test".to_string());
        let app_err: AppError = val_err.into();
        assert!(matches!(app_err, AppError::Validation(_)));
    }

    #[test]
    fn test_token_errors_collapse_to_auth() {
        assert!(matches!(
            AppError::from(TokenError::InvalidSignature),
            AppError::Auth(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            AppError::from(TokenError::ClassMismatch),
            AppError::Auth(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            AppError::from(TokenError::Expired),
            AppError::Auth(AuthError::TokenExpired)
        ));
        assert!(matches!(
            AppError::from(TokenError::Signing("boom".to_string())),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Conflict("email already registered".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth(AuthError::TokenRevoked).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::RateLimited { retry_after: Duration::from_secs(60) }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::StoreUnavailable("connection refused".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_failures_share_one_message() {
        let (_, expired) =
            <AppError as ErrorHandler>::error_response(&AppError::Auth(AuthError::TokenExpired));
        let (_, revoked) =
            <AppError as ErrorHandler>::error_response(&AppError::Auth(AuthError::TokenRevoked));
        let (_, invalid) =
            <AppError as ErrorHandler>::error_response(&AppError::Auth(AuthError::TokenInvalid));

        assert_eq!(expired.error, revoked.error);
        assert_eq!(revoked.error, invalid.error);
        assert_eq!(expired.code, "TOKEN_INVALID");
    }

    #[test]
    fn test_infrastructure_errors_are_opaque() {
        let err = AppError::StoreUnavailable("redis://10.0.0.3:6379 refused".to_string());
        let (status, body) = <AppError as ErrorHandler>::error_response(&err);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(!body.error.contains("redis"));
    }

    #[test]
    fn test_config_errors_surface_as_internal() {
        let missing = ConfigError::MissingRequired("jwt.issuer".to_string());
        assert_eq!(missing.to_string(), "Missing required config: jwt.issuer");

        let err: AppError = ConfigError::InvalidValue("bcrypt cost".to_string()).into();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidValue(_))));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(60)), 60);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[actix_web::test]
    async fn test_throttled_response_carries_retry_after() {
        let err = AppError::TooManyAttempts { retry_after: Duration::from_secs(900) };
        let response = ResponseError::error_response(&err);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "900"
        );

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "TOO_MANY_ATTEMPTS");
        assert!(json.get("error").is_some());
    }
}
