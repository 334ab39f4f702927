/// Session endpoints
use crate::{auth::AuthContext, context::AppContext, error::AppResult};
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/auth/logout", post(logout))
}

/// Revoke the presented token until it would have expired anyway
async fn logout(State(ctx): State<AppContext>, auth: AuthContext) -> AppResult<Json<Value>> {
    ctx.revocations.revoke(&auth.token, auth.expires_at).await?;

    tracing::info!(subject = %auth.subject, "token revoked on logout");

    Ok(Json(json!({ "success": true })))
}
