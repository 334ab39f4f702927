/// One-time passcode endpoints
///
/// Public and rate limited; the registration id is the only handle.
use crate::{
    api::{validate_request, ApiJson},
    context::AppContext,
    error::AppResult,
    otp::IssuedOtp,
};
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/otp/send", post(send_code))
        .route("/otp/verify", post(verify_code))
        .route("/otp/resend", post(resend_code))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OtpTargetRequest {
    #[validate(length(min = 1))]
    pub registration_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[validate(length(min = 1))]
    pub registration_id: String,
    #[validate(length(min = 1, max = 12))]
    pub code: String,
}

/// Hand a freshly persisted code to the SMS dispatcher
async fn deliver(ctx: &AppContext, registration_id: &str, issued: &IssuedOtp) -> AppResult<()> {
    let registration = ctx.registrations.get(registration_id).await?;
    let contact = ctx.registrations.contact_number(&registration).await?;
    ctx.sms.dispatch_otp(contact, registration_id, &issued.code);
    Ok(())
}

async fn send_code(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<OtpTargetRequest>,
) -> AppResult<Json<Value>> {
    validate_request(&req)?;

    let issued = ctx.otp.send(&req.registration_id).await?;
    deliver(&ctx, &req.registration_id, &issued).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Verification code sent",
        "expiresAt": issued.expires_at,
    })))
}

async fn verify_code(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> AppResult<Json<Value>> {
    validate_request(&req)?;

    ctx.otp.verify(&req.registration_id, &req.code).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Contact number verified",
    })))
}

async fn resend_code(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<OtpTargetRequest>,
) -> AppResult<Json<Value>> {
    validate_request(&req)?;

    let issued = ctx.otp.resend(&req.registration_id).await?;
    deliver(&ctx, &req.registration_id, &issued).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Verification code resent",
        "expiresAt": issued.expires_at,
    })))
}
