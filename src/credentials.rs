//! Password credentials.
//!
//! This is the only module that hashes or compares passwords. Hashes are
//! bcrypt and are computed on the blocking thread pool.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::db::{Database, User, UserRole, is_unique_violation};

/// Opaque bcrypt hash. Never serialized and never printed.
#[derive(Clone)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub(crate) fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Unknown user or wrong password. Deliberately indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username or email already registered")]
    Duplicate,
    #[error("user not found")]
    UserNotFound,
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Fields for a new account.
pub struct NewUser<'a> {
    pub uuid: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub role: UserRole,
}

/// Credential store: verifies and updates passwords for users in the database.
#[derive(Clone)]
pub struct Credentials {
    db: Database,
    cost: u32,
    /// Hash verified against when the username does not exist, so unknown
    /// users take as long to reject as wrong passwords.
    dummy_hash: Arc<OnceCell<PasswordHash>>,
}

impl Credentials {
    pub fn new(db: Database, cost: u32) -> Self {
        Self {
            db,
            cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Hash a plaintext password.
    pub async fn hash(&self, plaintext: &str) -> Result<PasswordHash, CredentialError> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost)).await??;
        Ok(PasswordHash(hash))
    }

    async fn matches(&self, hash: &PasswordHash, plaintext: &str) -> Result<bool, CredentialError> {
        let plaintext = plaintext.to_string();
        let hash = hash.0.clone();
        let ok = tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash)).await??;
        Ok(ok)
    }

    async fn dummy_hash(&self) -> Result<&PasswordHash, CredentialError> {
        self.dummy_hash
            .get_or_try_init(|| self.hash("quillgate-dummy-password"))
            .await
    }

    /// Verify a username/password pair and return the user.
    pub async fn verify(&self, username: &str, plaintext: &str) -> Result<User, CredentialError> {
        let Some((user, hash)) = self.db.users().get_with_hash_by_username(username).await? else {
            // Burn the same bcrypt work as a real comparison.
            let dummy = self.dummy_hash().await?;
            let _ = self.matches(dummy, plaintext).await?;
            debug!("Login attempt for unknown username");
            return Err(CredentialError::InvalidCredentials);
        };

        if self.matches(&hash, plaintext).await? {
            Ok(user)
        } else {
            debug!(user = %user.uuid, "Login attempt with wrong password");
            Err(CredentialError::InvalidCredentials)
        }
    }

    /// Check a user's current password.
    pub async fn check_password(
        &self,
        user_id: i64,
        plaintext: &str,
    ) -> Result<bool, CredentialError> {
        let hash = self
            .db
            .users()
            .get_password_hash(user_id)
            .await?
            .ok_or(CredentialError::UserNotFound)?;
        self.matches(&hash, plaintext).await
    }

    /// Replace a user's password.
    pub async fn set_password(&self, user_id: i64, plaintext: &str) -> Result<(), CredentialError> {
        let hash = self.hash(plaintext).await?;
        if !self.db.users().set_password_hash(user_id, &hash).await? {
            return Err(CredentialError::UserNotFound);
        }
        Ok(())
    }

    /// Create an account with the given password. Returns the user ID.
    pub async fn register(
        &self,
        new_user: NewUser<'_>,
        plaintext: &str,
    ) -> Result<i64, CredentialError> {
        let hash = self.hash(plaintext).await?;
        self.db
            .users()
            .create(
                new_user.uuid,
                new_user.username,
                new_user.email,
                new_user.role,
                &hash,
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    warn!(username = %new_user.username, "Duplicate registration rejected");
                    CredentialError::Duplicate
                } else {
                    CredentialError::Database(e)
                }
            })
    }
}
