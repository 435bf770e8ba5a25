use config::ConfigError;
use std::time::Duration;

use crate::validators::PasswordPolicy;

const MIN_SECRET_LENGTH: usize = 32;
/// One year
const MAX_TOKEN_EXPIRY_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub brute_force: BruteForceSettings,
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct RedisSettings {
    pub url: String,
}

/// JWT settings, one secret and lifetime per token class
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
}

/// Fixed-window limiter applied to every request
#[derive(serde::Deserialize, Clone, Debug)]
pub struct RateLimitSettings {
    pub requests_per_window: u32,
    pub window_seconds: u64,
    /// Honor X-Real-IP / X-Forwarded-For; only safe behind a trusted proxy
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_window: 10,
            window_seconds: 60,
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Lockout applied to the /auth endpoints
#[derive(serde::Deserialize, Clone, Debug)]
pub struct BruteForceSettings {
    pub max_attempts: u32,
    pub block_duration_seconds: u64,
    /// Idle time after which the attempt counter starts over
    pub stale_after_seconds: u64,
    /// Idle time after which the sweeper forgets an identifier
    pub evict_after_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for BruteForceSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            block_duration_seconds: 900,
            stale_after_seconds: 3600,
            evict_after_seconds: 86400,
            sweep_interval_seconds: 3600,
        }
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RevocationBackend {
    Redis,
    Memory,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct AuthSettings {
    pub bcrypt_cost: u32,
    pub revocation_backend: RevocationBackend,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            revocation_backend: RevocationBackend::Redis,
        }
    }
}

impl Settings {
    /// Reject configurations the server must not start with
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError as Invalid;

        let jwt = &self.jwt;
        for (name, secret) in [
            ("jwt.access_token_secret", &jwt.access_token_secret),
            ("jwt.refresh_token_secret", &jwt.refresh_token_secret),
        ] {
            if secret.is_empty() {
                return Err(Invalid::MissingRequired(name.to_string()));
            }
            if secret.len() < MIN_SECRET_LENGTH {
                return Err(Invalid::InvalidValue(format!(
                    "{} must be at least {} bytes",
                    name, MIN_SECRET_LENGTH
                )));
            }
        }
        if jwt.access_token_secret == jwt.refresh_token_secret {
            return Err(Invalid::InvalidValue(
                "access and refresh token secrets must differ".to_string(),
            ));
        }
        for (name, expiry) in [
            ("jwt.access_token_expiry", jwt.access_token_expiry),
            ("jwt.refresh_token_expiry", jwt.refresh_token_expiry),
        ] {
            if expiry <= 0 || expiry > MAX_TOKEN_EXPIRY_SECONDS {
                return Err(Invalid::InvalidValue(format!(
                    "{} must be between 1 and {} seconds",
                    name, MAX_TOKEN_EXPIRY_SECONDS
                )));
            }
        }
        if jwt.issuer.is_empty() {
            return Err(Invalid::MissingRequired("jwt.issuer".to_string()));
        }

        if self.rate_limit.requests_per_window == 0 || self.rate_limit.window_seconds == 0 {
            return Err(Invalid::InvalidValue(
                "rate_limit requires a non-zero limit and window".to_string(),
            ));
        }

        let brute_force = &self.brute_force;
        if brute_force.max_attempts == 0
            || brute_force.block_duration_seconds == 0
            || brute_force.sweep_interval_seconds == 0
        {
            return Err(Invalid::InvalidValue(
                "brute_force requires non-zero attempts, block duration and sweep interval"
                    .to_string(),
            ));
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(Invalid::InvalidValue(
                "auth.bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load settings from `configuration/base.yaml`, then the file named by
/// `APP_ENVIRONMENT` (default `local`), then `APP__SECTION__KEY` variables.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Message(format!("failed to determine current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".into());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base")).required(true))
        .add_source(config::File::from(configuration_directory.join(environment)).required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
