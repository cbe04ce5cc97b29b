//! JWT token generation and parsing.
//!
//! Access tokens (15 minutes) carry a snapshot of the user's role taken at
//! issuance. Refresh tokens (7 days) carry no roles and are only accepted by
//! the refresh endpoint. Both kinds get a fresh UUID v4 `jti`, which is the
//! unit of revocation.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::{User, UserRole};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived token authorizing resource access
    Access,
    /// Long-lived token exchangeable for a new access token
    Refresh,
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// JWT ID (unique per issued token, used for revocation)
    pub jti: String,
    /// Token type
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Set only on access tokens minted from a password login
    #[serde(default)]
    pub fresh: bool,
    /// Role snapshot. Kept as raw JSON so a malformed claim can be treated as
    /// "no roles" instead of failing the whole token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<serde_json::Value>,
}

impl Claims {
    /// Roles carried by the token.
    ///
    /// Anything other than an array made up entirely of known role names is
    /// treated as no roles at all.
    pub fn roles(&self) -> Vec<UserRole> {
        let Some(serde_json::Value::Array(items)) = &self.roles else {
            return Vec::new();
        };
        let parsed: Option<Vec<UserRole>> = items
            .iter()
            .map(|item| item.as_str().and_then(|s| s.parse().ok()))
            .collect();
        parsed.unwrap_or_default()
    }

    /// Whether any role in the token meets the required minimum.
    pub fn has_role_at_least(&self, required: UserRole) -> bool {
        self.roles().into_iter().any(|role| role.satisfies(required))
    }

    /// Whether the token is past its expiry at `now` (Unix seconds).
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.exp.saturating_add(CLOCK_SKEW_LEEWAY_SECS)
    }

    /// Seconds until expiry, zero if already expired.
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.exp.saturating_sub(now)
    }
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Tolerance applied when comparing `exp` to the current time.
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 0;

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// JWT ID
    pub jti: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token of the given kind for a user.
    ///
    /// Access tokens issued here are marked fresh; use
    /// [`issue_refreshed_access`](Self::issue_refreshed_access) for access
    /// tokens minted from a refresh token.
    pub fn issue(&self, user: &User, kind: TokenKind) -> Result<IssuedToken, JwtError> {
        self.mint(user, kind, kind == TokenKind::Access, unix_now()?)
    }

    /// Issue a non-fresh access token, as done by the refresh endpoint.
    pub fn issue_refreshed_access(&self, user: &User) -> Result<IssuedToken, JwtError> {
        self.mint(user, TokenKind::Access, false, unix_now()?)
    }

    fn mint(
        &self,
        user: &User,
        kind: TokenKind,
        fresh: bool,
        now: u64,
    ) -> Result<IssuedToken, JwtError> {
        let duration = match kind {
            TokenKind::Access => ACCESS_TOKEN_DURATION_SECS,
            TokenKind::Refresh => REFRESH_TOKEN_DURATION_SECS,
        };
        let roles = match kind {
            TokenKind::Access => Some(serde_json::json!([user.role.as_str()])),
            TokenKind::Refresh => None,
        };

        let claims = Claims {
            sub: user.uuid.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            kind,
            iat: now,
            exp: now + duration,
            fresh,
            roles,
        };

        let token = self.sign(&claims)?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            issued_at: now,
            expires_at: claims.exp,
            duration,
        })
    }

    /// Sign an arbitrary claim set.
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verify the signature and structure of a token and decode its claims.
    ///
    /// Expiry is not checked here; callers check [`Claims::is_expired`] so an
    /// expired token can be reported as such.
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e),
            })
    }
}

/// Errors that can occur while issuing tokens.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Error encoding the token
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    #[error("System time error")]
    TimeError,
}

/// Reasons a token fails to parse. Only logged; clients see one generic message.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    #[error("Invalid token signature")]
    InvalidSignature,
}
