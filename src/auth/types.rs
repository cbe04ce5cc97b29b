//! Authentication user types.

use crate::db::UserRole;
use crate::jwt::Claims;

/// Authenticated caller, as described by a validated access token.
///
/// Everything here comes from the token. Nothing is re-read from the database.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// JWT claims from the access token
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// Public user ID (the token subject).
    pub fn uuid(&self) -> &str {
        &self.claims.sub
    }

    /// Highest role carried by the token, if any.
    pub fn highest_role(&self) -> Option<UserRole> {
        self.claims.roles().into_iter().max()
    }

    pub fn is_admin(&self) -> bool {
        self.claims.has_role_at_least(UserRole::Admin)
    }
}
