/// QR credential endpoints
use crate::{
    api::ApiJson,
    auth::{AuthContext, StaffAuthContext},
    context::AppContext,
    error::AppResult,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/qr/generate", post(generate))
        .route("/qr/scan", post(scan))
        .route("/qr/download/:id", get(download))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub registration_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub qr_value: String,
}

/// Staff only; issuing expires the registration's earlier codes
async fn generate(
    State(ctx): State<AppContext>,
    StaffAuthContext(auth): StaffAuthContext,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let qr = ctx.qr.issue(req.registration_id.as_deref()).await?;

    tracing::debug!(qr_id = %qr.id, requested_by = %auth.subject, "QR generated");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "id": qr.id,
            "codeValue": qr.code_value,
            "imagePath": qr.image_path,
            "expiresAt": qr.expires_at,
        })),
    ))
}

async fn scan(
    State(ctx): State<AppContext>,
    StaffAuthContext(auth): StaffAuthContext,
    ApiJson(req): ApiJson<ScanRequest>,
) -> AppResult<Json<Value>> {
    let result = ctx.qr.resolve(&req.qr_value).await?;

    tracing::info!(
        registration_id = %result.registration.registration.id,
        scanned_by = %auth.subject,
        "QR scanned"
    );

    Ok(Json(json!({
        "success": true,
        "registration": result.registration,
        "qr": result.qr,
    })))
}

async fn download(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let (bytes, content_type) = ctx.qr.download(&id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"qr-{}.png\"", id),
            ),
        ],
        bytes,
    )
        .into_response())
}
