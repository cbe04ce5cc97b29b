//! Authentication error types.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::cookie::clear_cookie;
use crate::api::{ApiError, ErrorKind};

/// Why the guard rejected a request. The variant is logged; the client only
/// sees the mapped [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    TokenExpired,
    TokenRevoked,
    InsufficientRole,
    /// The revocation store failed or timed out. Access is denied.
    StoreUnavailable,
    Internal,
}

impl AuthErrorKind {
    pub fn to_api_error(self) -> ApiError {
        match self {
            AuthErrorKind::NotAuthenticated => ApiError::unauthorized("Not authenticated"),
            AuthErrorKind::InvalidToken => ApiError::unauthorized("Invalid token"),
            AuthErrorKind::TokenExpired => ApiError::unauthorized("Token has expired"),
            AuthErrorKind::TokenRevoked => ApiError::unauthorized("Token has been revoked"),
            AuthErrorKind::InsufficientRole => ApiError::forbidden("Insufficient permissions"),
            AuthErrorKind::StoreUnavailable => {
                ApiError::service_unavailable("Authorization check unavailable")
            }
            AuthErrorKind::Internal => {
                ApiError::new(ErrorKind::Internal, ErrorKind::Internal.default_message())
            }
        }
    }
}

/// Extractor rejection. On 401 the cookie that carried the rejected token is
/// cleared.
#[derive(Debug)]
pub struct ApiAuthError {
    kind: AuthErrorKind,
    cookie: &'static str,
    secure_cookies: bool,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind, cookie: &'static str, secure_cookies: bool) -> Self {
        Self {
            kind,
            cookie,
            secure_cookies,
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        let mut response = self.kind.to_api_error().into_response();

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Ok(value) = HeaderValue::from_str(&clear_cookie(self.cookie, self.secure_cookies))
            {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cookie::ACCESS_COOKIE_NAME;

    #[test]
    fn test_kind_to_status() {
        let table = [
            (AuthErrorKind::NotAuthenticated, 401),
            (AuthErrorKind::InvalidToken, 401),
            (AuthErrorKind::TokenExpired, 401),
            (AuthErrorKind::TokenRevoked, 401),
            (AuthErrorKind::InsufficientRole, 403),
            (AuthErrorKind::StoreUnavailable, 503),
            (AuthErrorKind::Internal, 500),
        ];
        for (kind, status) in table {
            assert_eq!(kind.to_api_error().kind().status().as_u16(), status);
        }
    }

    #[test]
    fn test_unauthorized_clears_cookie() {
        let response =
            ApiAuthError::new(AuthErrorKind::TokenRevoked, ACCESS_COOKIE_NAME, false)
                .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().starts_with("access_token=;"));
    }

    #[test]
    fn test_forbidden_keeps_cookie() {
        let response =
            ApiAuthError::new(AuthErrorKind::InsufficientRole, ACCESS_COOKIE_NAME, false)
                .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}
