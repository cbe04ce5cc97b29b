use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{Auth, EditorOrAbove, REFRESH_COOKIE_NAME, get_cookie, revoke_session};
use crate::db::{Database, UserRole};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/{uuid}", delete(delete_user))
        .with_state(state)
}

#[derive(Serialize)]
struct UserEntry {
    id: String,
    username: String,
    role: UserRole,
}

/// Directory of all users. Editors and admins only.
async fn list_users(
    State(state): State<UsersState>,
    _auth: Auth<EditorOrAbove>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;

    Ok(Json(
        users
            .into_iter()
            .map(|u| UserEntry {
                id: u.uuid,
                username: u.username,
                role: u.role,
            })
            .collect::<Vec<_>>(),
    ))
}

#[derive(Deserialize, Default)]
struct DeleteUserRequest {
    refresh_token: Option<String>,
}

/// Delete an account. Users may delete themselves; admins may delete anyone.
///
/// Self-deletion revokes the caller's tokens before the row is removed. If
/// revocation fails, nothing is deleted. An admin deleting someone else
/// revokes nothing: the deleted user's outstanding tokens stay valid until
/// they expire, and refresh then fails because the user is gone.
async fn delete_user(
    State(state): State<UsersState>,
    auth: Auth,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;

    let is_self = auth.uuid() == uuid;
    if !is_self && !auth.is_admin() {
        return Err(ApiError::forbidden("You can only delete your own account"));
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if is_self {
        let body: DeleteUserRequest = serde_json::from_slice(&body).unwrap_or_default();
        let refresh = body
            .refresh_token
            .as_deref()
            .or_else(|| get_cookie(&headers, REFRESH_COOKIE_NAME));
        revoke_session(&state.jwt, &state.db.revocations(), &auth.claims, refresh)
            .await
            .db_err("Failed to revoke tokens before deletion")?;
    } else {
        info!(user = %uuid, "revocation skipped, no active token in context");
    }

    let deleted = state
        .db
        .users()
        .delete(user.id)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user = %uuid, by = %auth.uuid(), "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
