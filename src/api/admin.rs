//! Admin API endpoints.
//!
//! All endpoints require admin role.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ApiError, ApiJson, ResultExt, validate_uuid};
use crate::auth::{AdminOnly, Auth};
use crate::db::{Database, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::validation::FieldErrors;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{uuid}/role", put(set_role))
        .route("/tokens/revoke", post(revoke_token))
        .with_state(state)
}

/// List all users with email and creation time.
async fn list_users(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list_summaries()
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: String,
}

#[derive(Serialize)]
struct SetRoleResponse {
    id: String,
    username: String,
    role: UserRole,
}

/// Change a user's stored role. Tokens already issued keep their role claim.
async fn set_role(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    Path(uuid): Path<String>,
    ApiJson(payload): ApiJson<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let role: UserRole = payload.role.parse().map_err(|e| {
        let mut errors = FieldErrors::new();
        errors.add("role", format!("{}. Expected one of: user, editor, admin.", e));
        ApiError::validation(errors)
    })?;

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !state
        .db
        .users()
        .set_role(user.id, role)
        .await
        .db_err("Failed to update role")?
    {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user = %uuid, from = %user.role, to = %role, by = %auth.uuid(), "Role changed");

    Ok(Json(SetRoleResponse {
        id: user.uuid,
        username: user.username,
        role,
    }))
}

#[derive(Deserialize)]
struct RevokeTokenRequest {
    token: String,
}

#[derive(Serialize)]
struct RevokeTokenResponse {
    jti: String,
    /// False when the token was already revoked
    newly_revoked: bool,
    expires_at: u64,
}

/// Revoke any validly signed token until its own expiry.
async fn revoke_token(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    ApiJson(payload): ApiJson<RevokeTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state.jwt.parse(&payload.token).map_err(|e| {
        debug!(error = %e, "Admin revocation with unparsable token");
        ApiError::bad_request("Invalid token")
    })?;

    let newly_revoked = state
        .db
        .revocations()
        .revoke(&claims.jti, claims.exp)
        .await
        .db_err("Failed to revoke token")?;

    info!(jti = %claims.jti, sub = %claims.sub, by = %auth.uuid(), "Token revoked by admin");

    Ok(Json(RevokeTokenResponse {
        jti: claims.jti,
        newly_revoked,
        expires_at: claims.exp,
    }))
}
