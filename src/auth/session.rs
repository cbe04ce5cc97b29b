//! Revoking the tokens of the current session.

use tracing::{debug, info};

use crate::db::RevocationStore;
use crate::jwt::{Claims, JwtConfig, TokenKind};

/// Revoke the caller's access token and, when supplied, the matching refresh
/// token.
///
/// A refresh token is only revoked if it is validly signed, is a refresh
/// token, and belongs to the same subject. Anything else is ignored.
/// Returns the number of tokens newly revoked.
pub async fn revoke_session(
    jwt: &JwtConfig,
    revocations: &RevocationStore,
    access: &Claims,
    refresh_token: Option<&str>,
) -> Result<u32, sqlx::Error> {
    let mut revoked = 0;
    if revocations.revoke(&access.jti, access.exp).await? {
        revoked += 1;
    }

    if let Some(token) = refresh_token {
        match jwt.parse(token) {
            Ok(refresh) if refresh.kind == TokenKind::Refresh && refresh.sub == access.sub => {
                if revocations.revoke(&refresh.jti, refresh.exp).await? {
                    revoked += 1;
                }
            }
            Ok(_) => debug!(sub = %access.sub, "Ignoring refresh token for another session"),
            Err(e) => debug!(error = %e, "Ignoring unparsable refresh token"),
        }
    }

    info!(sub = %access.sub, revoked, "Session revoked");
    Ok(revoked)
}
