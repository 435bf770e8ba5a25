use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::accounts::PgAccountStore;
use crate::auth::{
    AuthService, InMemoryRevocationStore, RedisRevocationStore, RevocationStore, TokenCodec,
};
use crate::configuration::{BruteForceSettings, RateLimitSettings, RevocationBackend, Settings};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{BruteForceMiddleware, JwtMiddleware, RateLimitMiddleware};
use crate::routes::{get_current_account, health_check, login, logout, refresh, register};
use crate::security::{spawn_sweeper, BruteForceGuard, RateLimiter, SweeperHandle};

const MAX_JSON_PAYLOAD: usize = 4096;
const REVOCATION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Components shared by every worker
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub brute_force: Arc<BruteForceGuard>,
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(
        auth: AuthService,
        rate_limit: &RateLimitSettings,
        brute_force: &BruteForceSettings,
    ) -> Self {
        Self {
            auth: Arc::new(auth),
            rate_limiter: Arc::new(RateLimiter::from_settings(rate_limit)),
            brute_force: Arc::new(BruteForceGuard::new(brute_force)),
            trust_proxy_headers: rate_limit.trust_proxy_headers,
        }
    }

    /// Start the background sweepers for both request guards
    pub fn start_sweepers(&self) -> Vec<SweeperHandle> {
        vec![
            self.rate_limiter.start_sweeper(),
            self.brute_force.start_sweeper(),
        ]
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let auth_data = web::Data::from(state.auth.clone());
    let brute_force_data = web::Data::from(state.brute_force.clone());

    let json_config = web::JsonConfig::default()
        .limit(MAX_JSON_PAYLOAD)
        .error_handler(|err, _req| {
            AppError::Validation(ValidationError::MalformedBody(err.to_string())).into()
        });

    let server = HttpServer::new(move || {
        App::new()
            // Last wrap runs first, so the logger also sees rate-limit rejections
            .wrap(RateLimitMiddleware::new(
                state.rate_limiter.clone(),
                state.trust_proxy_headers,
            ))
            .wrap(LoggerMiddleware)
            .app_data(json_config.clone())
            .app_data(auth_data.clone())
            .app_data(brute_force_data.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .wrap(BruteForceMiddleware::new(
                        state.brute_force.clone(),
                        state.trust_proxy_headers,
                    ))
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout)),
            )
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(state.auth.clone()))
                    .route("/me", web::get().to(get_current_account)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// A bound server plus the background tasks it owns
pub struct Application {
    port: u16,
    server: Server,
    sweepers: Vec<SweeperHandle>,
}

impl Application {
    /// Validate settings, connect the stores, bind the listener
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;

        tracing::info!("Attempting to connect to database");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(2))
            .connect(&settings.database.connection_string())
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;
        tracing::info!("Database ready");

        let mut sweepers = Vec::new();
        let revocations: Arc<dyn RevocationStore> = match settings.auth.revocation_backend {
            RevocationBackend::Redis => {
                Arc::new(RedisRevocationStore::connect(&settings.redis.url).await?)
            }
            RevocationBackend::Memory => {
                tracing::warn!("Using in-memory revocation store; revocations are lost on restart");
                let store = Arc::new(InMemoryRevocationStore::new());
                let purged = store.clone();
                sweepers.push(spawn_sweeper(
                    "revocation_store",
                    REVOCATION_PURGE_INTERVAL,
                    move |now| purged.purge_expired(now),
                ));
                store
            }
        };

        let auth = AuthService::new(
            Arc::new(PgAccountStore::new(pool)),
            revocations,
            TokenCodec::new(&settings.jwt),
            settings.password_policy.clone(),
            settings.auth.bcrypt_cost,
        );
        let state = AppState::new(auth, &settings.rate_limit, &settings.brute_force);
        sweepers.extend(state.start_sweepers());

        let address = format!("{}:{}", settings.application.host, settings.application.port);
        let listener = TcpListener::bind(&address)
            .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", address, e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .port();
        tracing::info!(address = %address, port, "Server listening");

        let server = run(listener, state)
            .map_err(|e| AppError::Internal(format!("Failed to start server: {}", e)))?;

        Ok(Self {
            port,
            server,
            sweepers,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the server stops, then stop the background tasks
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        let result = self.server.await;

        for sweeper in self.sweepers {
            sweeper.shutdown().await;
        }
        tracing::info!("Server stopped");

        result
    }
}
