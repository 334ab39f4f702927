/// Background task implementations
use crate::{context::AppContext, error::AppResult};

/// Remove revocation entries whose token has expired on its own
pub async fn cleanup_revoked_tokens(ctx: &AppContext) -> AppResult<u64> {
    ctx.revocations.cleanup_expired().await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}
