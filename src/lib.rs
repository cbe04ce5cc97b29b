pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod credentials;
pub mod db;
pub mod jwt;
pub mod rate_limit;
pub mod validation;

use api::{create_api_router, panic_response};
use axum::Router;
use credentials::Credentials;
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Read client IPs from X-Forwarded-For (requires running behind a proxy)
    pub trust_proxy: bool,
    /// Login attempts per minute per client IP
    pub login_rate_per_minute: u32,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));
    let credentials = Credentials::new(config.db.clone(), config.bcrypt_cost);
    let rate_limit_config = Arc::new(RateLimitConfig::new(
        config.login_rate_per_minute,
        config.trust_proxy,
    ));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        credentials,
        config.secure_cookies,
        rate_limit_config,
    );

    Router::new()
        .nest("/api", api_router)
        .fallback(api::not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
