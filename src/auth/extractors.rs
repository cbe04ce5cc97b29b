//! Axum extractors for authentication.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};
use super::errors::ApiAuthError;
use super::guard::{authorize, check_token};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::db::UserRole;
use crate::jwt::{Claims, TokenKind};

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

/// Access token from the Bearer header, falling back to the access cookie.
pub fn access_token_from(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| get_cookie(headers, ACCESS_COOKIE_NAME))
}

/// Refresh token from the Bearer header, falling back to the refresh cookie.
pub fn refresh_token_from(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| get_cookie(headers, REFRESH_COOKIE_NAME))
}

/// Minimum role a route requires, declared at the type level.
pub trait RoleConstraint: Send + Sync + 'static {
    const REQUIRED: Option<UserRole>;
}

/// Any authenticated caller.
pub struct AnyRole;

/// Editors and admins.
pub struct EditorOrAbove;

/// Admins only.
pub struct AdminOnly;

impl RoleConstraint for AnyRole {
    const REQUIRED: Option<UserRole> = None;
}

impl RoleConstraint for EditorOrAbove {
    const REQUIRED: Option<UserRole> = Some(UserRole::Editor);
}

impl RoleConstraint for AdminOnly {
    const REQUIRED: Option<UserRole> = Some(UserRole::Admin);
}

/// Extractor for routes that require a live access token and a minimum role.
///
/// ```ignore
/// async fn handler(auth: Auth<AdminOnly>) { /* ... */ }
/// ```
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub user: AuthenticatedUser,
    _constraint: PhantomData<fn() -> R>,
}

impl<R: RoleConstraint> Deref for Auth<R> {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = access_token_from(&parts.headers);
        let claims = authorize(state.jwt(), &state.db().revocations(), token, R::REQUIRED)
            .await
            .map_err(|kind| ApiAuthError::new(kind, ACCESS_COOKIE_NAME, state.secure_cookies()))?;

        Ok(Auth {
            user: AuthenticatedUser { claims },
            _constraint: PhantomData,
        })
    }
}

/// Optional authentication extractor. Never fails.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = access_token_from(&parts.headers);
        let user = authorize(state.jwt(), &state.db().revocations(), token, None)
            .await
            .ok()
            .map(|claims| AuthenticatedUser { claims });
        Ok(OptionalAuth(user))
    }
}

/// Extractor for the refresh endpoint. Accepts refresh tokens only.
pub struct RefreshAuth(pub Claims);

impl<S> FromRequestParts<S> for RefreshAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = refresh_token_from(&parts.headers);
        check_token(
            state.jwt(),
            &state.db().revocations(),
            token,
            TokenKind::Refresh,
        )
        .await
        .map(RefreshAuth)
        .map_err(|kind| ApiAuthError::new(kind, REFRESH_COOKIE_NAME, state.secure_cookies()))
    }
}
