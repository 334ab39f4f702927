/// Administrative endpoints
use crate::{auth::AdminAuthContext, context::AppContext, error::AppResult};
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/admin/purge", post(purge))
}

/// Delete every OTP request and QR credential. Registrations stay.
async fn purge(
    State(ctx): State<AppContext>,
    AdminAuthContext(auth): AdminAuthContext,
) -> AppResult<Json<Value>> {
    let otp_deleted = ctx.otp.purge_all().await?;
    let qr_deleted = ctx.qr.purge_all().await?;

    tracing::warn!(
        admin = %auth.subject,
        otp_deleted,
        qr_deleted,
        "credential tables purged"
    );

    Ok(Json(json!({
        "success": true,
        "otpRequestsDeleted": otp_deleted,
        "qrCodesDeleted": qr_deleted,
    })))
}
