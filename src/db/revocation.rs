//! Revoked token storage.
//!
//! Every entry carries the revoked token's own expiry. Once that moment has
//! passed the token is rejected on expiry alone, so the entry can be purged.

use sqlx::sqlite::SqlitePool;

/// A revoked token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub jti: String,
    /// Unix seconds at which the revocation was recorded.
    pub revoked_at: i64,
    /// Unix seconds at which the revoked token expires on its own.
    pub expires_at: i64,
}

/// Store for revoked token ids.
#[derive(Clone)]
pub struct RevocationStore {
    pool: SqlitePool,
}

impl RevocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Revoke a token id until `expires_at` (Unix seconds).
    ///
    /// Idempotent: revoking an already revoked jti is a no-op. Returns whether
    /// this call created the entry.
    pub async fn revoke(&self, jti: &str, expires_at: u64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (jti, revoked_at, expires_at)
             VALUES (?, CAST(strftime('%s', 'now') AS INTEGER), ?)
             ON CONFLICT(jti) DO NOTHING",
        )
        .bind(jti)
        .bind(to_sql_timestamp(expires_at))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether a token id has been revoked.
    pub async fn is_revoked(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM revoked_tokens WHERE jti = ?")
            .bind(jti)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Get the revocation entry for a token id.
    pub async fn get(&self, jti: &str) -> Result<Option<RevocationEntry>, sqlx::Error> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(
            "SELECT jti, revoked_at, expires_at FROM revoked_tokens WHERE jti = ?",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(jti, revoked_at, expires_at)| RevocationEntry {
            jti,
            revoked_at,
            expires_at,
        }))
    }

    /// Delete entries whose token has already expired.
    /// Entries expiring now or later are kept.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM revoked_tokens WHERE expires_at < CAST(strftime('%s', 'now') AS INTEGER)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM revoked_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

/// SQLite integers are signed; clamp timestamps that would not fit.
fn to_sql_timestamp(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
