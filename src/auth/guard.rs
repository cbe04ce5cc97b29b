//! The authorization decision.
//!
//! Checks run in a fixed order: presence, signature and structure (including
//! token kind), expiry, revocation, then role. The first failure wins.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::errors::AuthErrorKind;
use crate::db::{RevocationStore, UserRole};
use crate::jwt::{Claims, JwtConfig, TokenKind, unix_now};

/// Upper bound on a revocation lookup. Exceeding it denies the request.
pub const REVOCATION_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Validate a token of the expected kind, without any role requirement.
pub async fn check_token(
    jwt: &JwtConfig,
    revocations: &RevocationStore,
    token: Option<&str>,
    expected: TokenKind,
) -> Result<Claims, AuthErrorKind> {
    let token = token.ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = jwt.parse(token).map_err(|e| {
        debug!(error = %e, "Token failed to parse");
        AuthErrorKind::InvalidToken
    })?;

    if claims.kind != expected {
        debug!(jti = %claims.jti, kind = ?claims.kind, expected = ?expected, "Wrong token kind");
        return Err(AuthErrorKind::InvalidToken);
    }

    let now = unix_now().map_err(|e| {
        error!(error = %e, "Failed to read system clock");
        AuthErrorKind::Internal
    })?;
    if claims.is_expired(now) {
        debug!(jti = %claims.jti, "Token expired");
        return Err(AuthErrorKind::TokenExpired);
    }

    if lookup_revoked(revocations.is_revoked(&claims.jti), REVOCATION_LOOKUP_TIMEOUT).await? {
        warn!(jti = %claims.jti, sub = %claims.sub, "Revoked token presented");
        return Err(AuthErrorKind::TokenRevoked);
    }

    Ok(claims)
}

/// Require a minimum role. `None` admits any authenticated caller.
pub fn check_role(claims: &Claims, required: Option<UserRole>) -> Result<(), AuthErrorKind> {
    match required {
        Some(role) if !claims.has_role_at_least(role) => {
            debug!(sub = %claims.sub, required = %role, "Insufficient role");
            Err(AuthErrorKind::InsufficientRole)
        }
        _ => Ok(()),
    }
}

/// Full access check: a live access token carrying at least `required`.
pub async fn authorize(
    jwt: &JwtConfig,
    revocations: &RevocationStore,
    token: Option<&str>,
    required: Option<UserRole>,
) -> Result<Claims, AuthErrorKind> {
    let claims = check_token(jwt, revocations, token, TokenKind::Access).await?;
    check_role(&claims, required)?;
    Ok(claims)
}

/// Run a revocation lookup under a deadline. Errors and timeouts fail closed.
pub(crate) async fn lookup_revoked<F>(lookup: F, limit: Duration) -> Result<bool, AuthErrorKind>
where
    F: Future<Output = Result<bool, sqlx::Error>>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(revoked)) => Ok(revoked),
        Ok(Err(e)) => {
            error!(error = %e, "Revocation lookup failed");
            Err(AuthErrorKind::StoreUnavailable)
        }
        Err(_) => {
            error!(timeout_ms = limit.as_millis() as u64, "Revocation lookup timed out");
            Err(AuthErrorKind::StoreUnavailable)
        }
    }
}
