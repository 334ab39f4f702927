/// Persisted token revocation list
///
/// Logout stores a digest of the bearer token together with its `exp`.
/// Entries are only useful until that moment, so cleanup deletes rows
/// whose expiry has passed and nothing else.

use crate::error::AppResult;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct RevocationList {
    db: SqlitePool,
}

impl RevocationList {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Revoke a token until `expires_at` (unix seconds). Revoking twice is a no-op.
    pub async fn revoke(&self, token: &str, expires_at: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO revoked_token (token_digest, expires_at, revoked_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(token_digest) DO NOTHING
            "#,
        )
        .bind(token_digest(token))
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> AppResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM revoked_token WHERE token_digest = ?1")
                .bind(token_digest(token))
                .fetch_optional(&self.db)
                .await?;

        Ok(found.is_some())
    }

    /// Drop entries whose token has expired on its own
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_token WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
