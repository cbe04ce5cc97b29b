//! Session endpoints.
//!
//! - POST `/login` - Exchange username and password for access and refresh tokens
//! - POST `/register` - Create an account
//! - POST `/refresh` - Exchange a refresh token for a new access token
//! - POST `/logout` - Revoke the current session and clear cookies
//! - POST `/change-password` - Replace the password and revoke the current session
//! - GET `/status` - Whether the caller is logged in (never fails)
//! - GET `/me` - Claims of the current access token

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ApiJson, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, OptionalAuth, REFRESH_COOKIE_NAME, RefreshAuth, clear_cookie,
    get_cookie, revoke_session, token_cookie,
};
use crate::credentials::{Credentials, NewUser};
use crate::db::{Database, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::{JwtConfig, TokenKind};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};
use crate::validation::{FieldErrors, validate_email, validate_password, validate_username};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub credentials: Credentials,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let limited = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/status", get(status))
        .route("/me", get(me))
        .with_state(state)
        .merge(limited)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

async fn login(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let user = state
        .credentials
        .verify(&payload.username, &payload.password)
        .await?;

    let access = state.jwt.issue(&user, TokenKind::Access)?;
    let refresh = state.jwt.issue(&user, TokenKind::Refresh)?;

    info!(user = %user.uuid, access_jti = %access.jti, "User logged in");

    let access_cookie = token_cookie(
        ACCESS_COOKIE_NAME,
        &access.token,
        access.duration,
        state.secure_cookies,
    );
    let refresh_cookie = token_cookie(
        REFRESH_COOKIE_NAME,
        &refresh.token,
        refresh.duration,
        state.secure_cookies,
    );

    Ok((
        AppendHeaders([(SET_COOKIE, access_cookie), (SET_COOKIE, refresh_cookie)]),
        Json(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
        }),
    ))
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    id: String,
    username: String,
    role: UserRole,
}

async fn register(
    State(state): State<AuthState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    errors.extend("username", validate_username(&payload.username));
    errors.extend("email", validate_email(&payload.email));
    errors.extend("password", validate_password(&payload.password));
    errors.into_result().map_err(ApiError::validation)?;

    let uuid = uuid::Uuid::new_v4().to_string();
    state
        .credentials
        .register(
            NewUser {
                uuid: &uuid,
                username: &payload.username,
                email: &payload.email,
                role: UserRole::User,
            },
            &payload.password,
        )
        .await?;

    info!(user = %uuid, username = %payload.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: uuid,
            username: payload.username,
            role: UserRole::User,
        }),
    ))
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
}

/// Mint a new, non-fresh access token from a live refresh token.
///
/// The role is read from the current user record, so role changes apply from
/// the next refresh.
async fn refresh(
    State(state): State<AuthState>,
    RefreshAuth(claims): RefreshAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| {
            warn!(sub = %claims.sub, "Refresh token for missing user");
            ApiError::unauthorized("User not found")
        })?;

    let access = state.jwt.issue_refreshed_access(&user)?;

    let access_cookie = token_cookie(
        ACCESS_COOKIE_NAME,
        &access.token,
        access.duration,
        state.secure_cookies,
    );

    Ok((
        [(SET_COOKIE, access_cookie)],
        Json(RefreshResponse {
            access_token: access.token,
        }),
    ))
}

/// Optional body accepted by logout and password change.
#[derive(Deserialize, Default)]
struct SessionBody {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Refresh token named in the body, falling back to the refresh cookie.
fn supplied_refresh_token<'a>(body: &'a SessionBody, headers: &'a HeaderMap) -> Option<&'a str> {
    body.refresh_token
        .as_deref()
        .or_else(|| get_cookie(headers, REFRESH_COOKIE_NAME))
}

fn clear_session_cookies(secure: bool) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, secure)),
        (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, secure)),
    ])
}

async fn logout(
    State(state): State<AuthState>,
    auth: Auth,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // The body is optional and may be empty
    let body: SessionBody = serde_json::from_slice(&body).unwrap_or_default();

    revoke_session(
        &state.jwt,
        &state.db.revocations(),
        &auth.claims,
        supplied_refresh_token(&body, &headers),
    )
    .await
    .db_err("Failed to revoke session")?;

    info!(user = %auth.uuid(), "User logged out");

    Ok((
        clear_session_cookies(state.secure_cookies),
        Json(MessageResponse {
            message: "Logged out",
        }),
    ))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Replace the caller's password and end the current session.
///
/// The session is revoked before the new hash is stored, so a failed
/// revocation leaves the old password in place. Only the presented access
/// token and the supplied refresh token (body or cookie) are revoked; any
/// other refresh token for this user stays valid until it expires.
async fn change_password(
    State(state): State<AuthState>,
    auth: Auth,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(auth.uuid())
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    if !state
        .credentials
        .check_password(user.id, &payload.current_password)
        .await?
    {
        warn!(user = %user.uuid, "Password change with wrong current password");
        return Err(ApiError::unauthorized("Current password is incorrect."));
    }

    let mut errors = FieldErrors::new();
    errors.extend("new_password", validate_password(&payload.new_password));
    errors.into_result().map_err(ApiError::validation)?;

    let body = SessionBody {
        refresh_token: payload.refresh_token,
    };
    revoke_session(
        &state.jwt,
        &state.db.revocations(),
        &auth.claims,
        supplied_refresh_token(&body, &headers),
    )
    .await
    .db_err("Failed to revoke session before password change")?;

    state
        .credentials
        .set_password(user.id, &payload.new_password)
        .await?;

    info!(user = %user.uuid, "Password changed");

    Ok((
        clear_session_cookies(state.secure_cookies),
        Json(MessageResponse {
            message: "Password changed",
        }),
    ))
}

#[derive(Serialize)]
struct StatusUser {
    id: String,
    username: String,
    role: Option<UserRole>,
}

#[derive(Serialize)]
struct StatusResponse {
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<StatusUser>,
}

impl StatusResponse {
    fn logged_out() -> Self {
        Self {
            logged_in: false,
            user: None,
        }
    }
}

async fn status(
    State(state): State<AuthState>,
    OptionalAuth(auth): OptionalAuth,
) -> Json<StatusResponse> {
    let Some(auth) = auth else {
        return Json(StatusResponse::logged_out());
    };

    match state.db.users().get_by_uuid(auth.uuid()).await {
        Ok(Some(user)) => Json(StatusResponse {
            logged_in: true,
            user: Some(StatusUser {
                id: user.uuid,
                username: user.username,
                role: auth.highest_role(),
            }),
        }),
        Ok(None) => Json(StatusResponse::logged_out()),
        Err(e) => {
            warn!(error = %e, "Status lookup failed");
            Json(StatusResponse::logged_out())
        }
    }
}

#[derive(Serialize)]
struct MeResponse {
    id: String,
    roles: Vec<UserRole>,
    jti: String,
    expires_at: u64,
    fresh: bool,
}

async fn me(auth: Auth) -> Json<MeResponse> {
    let claims = &auth.claims;
    Json(MeResponse {
        id: claims.sub.clone(),
        roles: claims.roles(),
        jti: claims.jti.clone(),
        expires_at: claims.exp,
        fresh: claims.fresh,
    })
}
