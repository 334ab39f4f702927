/// Registration, approval and check-in endpoints
use crate::{
    api::{validate_request, ApiJson},
    auth::{AuthContext, OptionalAuthContext, StaffAuthContext},
    context::AppContext,
    error::{AppError, AppResult},
    registration::NewRegistration,
};
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/registrations", post(create_registration))
        .route("/registrations/:id", get(get_registration))
        .route("/registrations/:id/approval", post(decide_registration))
        .route("/registrations/:id/checkin", post(check_in))
}

/// JSON form of a registration submission
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistrationRequest {
    #[validate(length(min = 1))]
    pub event_id: String,
    pub profile_id: Option<String>,
    #[validate(length(min = 7, max = 32))]
    pub contact_number: Option<String>,
    pub custom_values: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub status: String,
}

/// Uploaded photo from a multipart submission
struct PhotoUpload {
    data: Vec<u8>,
    content_type: Option<String>,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Read the text fields and optional `photo` part of a multipart body
async fn read_multipart(
    mut multipart: Multipart,
) -> AppResult<(CreateRegistrationRequest, Option<PhotoUpload>)> {
    let mut req = CreateRegistrationRequest::default();
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "photo" {
            let content_type = field.content_type().map(String::from);
            let data = field.bytes().await?;
            if !data.is_empty() {
                photo = Some(PhotoUpload {
                    data: data.to_vec(),
                    content_type,
                });
            }
            continue;
        }

        let text = field.text().await?;

        match name.as_str() {
            "eventId" => req.event_id = text.trim().to_string(),
            "profileId" => req.profile_id = non_empty(text),
            "contactNumber" => req.contact_number = non_empty(text),
            "customValues" => {
                if let Some(text) = non_empty(text) {
                    let values = serde_json::from_str(&text).map_err(|_| {
                        AppError::Validation("customValues must be a JSON object".to_string())
                    })?;
                    req.custom_values = Some(values);
                }
            }
            other => tracing::debug!(field = %other, "ignoring unknown multipart field"),
        }
    }

    Ok((req, photo))
}

/// Accepts JSON or multipart/form-data (with an optional `photo` file).
///
/// The registration and its first one-time code are written separately;
/// if issuing the code fails the caller recovers with `/otp/resend`.
async fn create_registration(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
    request: Request,
) -> AppResult<(StatusCode, Json<Value>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let (req, photo) = if is_multipart {
        let multipart = Multipart::from_request(request, &ctx).await?;
        read_multipart(multipart).await?
    } else {
        let ApiJson(req) = ApiJson::<CreateRegistrationRequest>::from_request(request, &ctx).await?;
        (req, None)
    };

    validate_request(&req)?;

    let photo_path = match photo {
        Some(photo) => Some(
            ctx.uploads
                .store_photo(&photo.data, photo.content_type.as_deref())
                .await?,
        ),
        None => None,
    };

    let created = ctx
        .registrations
        .create(NewRegistration {
            event_id: req.event_id,
            profile_id: req.profile_id,
            contact_number: req.contact_number,
            custom_values: req.custom_values.unwrap_or_else(|| json!({})),
            photo_path: photo_path.clone(),
        })
        .await;

    let registration = match created {
        Ok(registration) => registration,
        Err(e) => {
            if let Some(path) = &photo_path {
                if let Err(cleanup) = ctx.uploads.delete(path).await {
                    tracing::warn!(path = %path, error = %cleanup, "failed to remove orphaned photo");
                }
            }
            return Err(e);
        }
    };

    tracing::info!(
        registration_id = %registration.id,
        event_id = %registration.event_id,
        submitted_by = auth.auth.as_ref().map(|a| a.subject.as_str()).unwrap_or("anonymous"),
        "registration submitted"
    );

    let issued = ctx.otp.issue(&registration.id).await?;
    let contact = ctx.registrations.contact_number(&registration).await?;
    ctx.sms.dispatch_otp(contact, &registration.id, &issued.code);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "registrationId": registration.id,
            "otpExpiresAt": issued.expires_at,
        })),
    ))
}

async fn get_registration(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let registration = ctx.registrations.get_details(&id).await?;
    Ok(Json(json!({ "success": true, "registration": registration })))
}

async fn decide_registration(
    State(ctx): State<AppContext>,
    StaffAuthContext(auth): StaffAuthContext,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ApprovalRequest>,
) -> AppResult<Json<Value>> {
    let registration = ctx.approvals.decide(&id, &req.status).await?;

    tracing::info!(registration_id = %id, decided_by = %auth.subject, "approval recorded");

    Ok(Json(json!({ "success": true, "registration": registration })))
}

async fn check_in(
    State(ctx): State<AppContext>,
    StaffAuthContext(auth): StaffAuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let attendance = ctx.approvals.check_in(&id, Some(&auth.subject)).await?;
    Ok(Json(json!({ "success": true, "attendance": attendance })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::Role,
        db::models::RegistrationStatus,
        test_support::{self, json_request, send},
    };
    use axum::body::Body;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::new(4, 4);
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn multipart_body(boundary: &str, event_id: &str, photo: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        let text_part = |name: &str, value: &str| {
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
        };
        body.extend_from_slice(text_part("eventId", event_id).as_bytes());
        body.extend_from_slice(text_part("contactNumber", "09171234567").as_bytes());
        body.extend_from_slice(text_part("customValues", r#"{"age":34}"#).as_bytes());
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n",
                boundary
            )
            .as_bytes(),
        );
        body.extend_from_slice(photo);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        body
    }

    #[tokio::test]
    async fn test_create_registration_json_issues_code() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let event = test_support::seed_event(&ctx.db).await;

        let body = json!({
            "eventId": event.id,
            "contactNumber": "09171234567",
            "customValues": { "shirtSize": "M" }
        });
        let (status, json) = send(&ctx, json_request("POST", "/registrations", None, body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);

        let id = json["registrationId"].as_str().unwrap();
        let registration = ctx.registrations.get(id).await.unwrap();
        assert_eq!(registration.status, RegistrationStatus::Pending);
        assert!(ctx.otp.latest(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_registration_multipart_with_photo() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let event = test_support::seed_event(&ctx.db).await;

        let boundary = "XBOUNDARYX";
        let request = axum::http::Request::post("/registrations")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(multipart_body(boundary, &event.id, &png_bytes())))
            .unwrap();

        let (status, json) = send(&ctx, request).await;
        assert_eq!(status, StatusCode::CREATED, "{}", json);

        let id = json["registrationId"].as_str().unwrap();
        let registration = ctx.registrations.get(id).await.unwrap();
        let photo_path = registration.photo_path.clone().unwrap();
        assert!(photo_path.starts_with("photos/"));
        assert!(dir.path().join(&photo_path).exists());
        assert_eq!(registration.custom_values_json()["age"], 34);
    }

    #[tokio::test]
    async fn test_create_registration_unknown_event() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;

        let body = json!({ "eventId": "missing" });
        let (status, json) = send(&ctx, json_request("POST", "/registrations", None, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "ValidationError");
    }

    #[tokio::test]
    async fn test_approval_and_check_in_flow() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let event = test_support::seed_event(&ctx.db).await;
        let registration = test_support::seed_registration(&ctx.db, &event.id).await;
        let staff = test_support::bearer(&ctx, Role::Staff);
        let resident = test_support::bearer(&ctx, Role::Resident);

        let approval_uri = format!("/registrations/{}/approval", registration.id);
        let checkin_uri = format!("/registrations/{}/checkin", registration.id);

        let (status, _) = send(
            &ctx,
            json_request("POST", &approval_uri, Some(&resident), json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = send(
            &ctx,
            json_request("POST", &approval_uri, Some(&staff), json!({ "status": "bogus" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "InvalidStatus");

        let (status, json) = send(
            &ctx,
            json_request("POST", &approval_uri, Some(&staff), json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["registration"]["status"], "APPROVED");

        let (status, json) =
            send(&ctx, json_request("POST", &checkin_uri, Some(&staff), Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["attendance"]["checkedInBy"], "staff-user");

        let (status, json) =
            send(&ctx, json_request("POST", &checkin_uri, Some(&staff), Value::Null)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "ConflictError");
    }

    #[tokio::test]
    async fn test_get_registration_requires_auth() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let event = test_support::seed_event(&ctx.db).await;
        let registration = test_support::seed_registration(&ctx.db, &event.id).await;
        let uri = format!("/registrations/{}", registration.id);

        let (status, _) = send(&ctx, json_request("GET", &uri, None, Value::Null)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let resident = test_support::bearer(&ctx, Role::Resident);
        let (status, json) = send(&ctx, json_request("GET", &uri, Some(&resident), Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["registration"]["id"], registration.id.as_str());
    }
}
