mod admin;
mod auth;
mod error;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::credentials::Credentials;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::{
    ApiError, ApiJson, ErrorKind, ResultExt, not_found, panic_response, validate_uuid,
};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    credentials: Credentials,
    secure_cookies: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        credentials,
        secure_cookies,
        rate_limit_config,
    };

    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies,
    };

    let admin_state = admin::AdminState {
        db,
        jwt,
        secure_cookies,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/admin", admin::router(admin_state))
        .fallback(not_found)
}
