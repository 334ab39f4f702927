/// Event and profile endpoints
use crate::{
    api::{validate_request, ApiJson, ApiQuery},
    auth::{AuthContext, StaffAuthContext},
    context::AppContext,
    db::models::RegistrationStatus,
    error::{AppError, AppResult},
    events::{NewEvent, NewProfile},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/:id", get(get_event))
        .route("/events/:id/registrations", get(list_registrations))
        .route("/profiles", post(create_profile))
        .route("/profiles/:id", get(get_profile))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    pub contact_number: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Parse a `?status=` filter, case-insensitive
fn parse_status_filter(value: &str) -> AppResult<RegistrationStatus> {
    match value.to_ascii_uppercase().as_str() {
        "PENDING" => Ok(RegistrationStatus::Pending),
        "APPROVED" => Ok(RegistrationStatus::Approved),
        "REJECTED" => Ok(RegistrationStatus::Rejected),
        _ => Err(AppError::InvalidStatus(format!(
            "'{}' is not one of: pending, approved, rejected",
            value
        ))),
    }
}

async fn create_event(
    State(ctx): State<AppContext>,
    StaffAuthContext(auth): StaffAuthContext,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    validate_request(&req)?;

    let event = ctx
        .events
        .create_event(NewEvent {
            title: req.title,
            description: req.description,
            venue: req.venue,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
        })
        .await?;

    tracing::info!(event_id = %event.id, created_by = %auth.subject, "event created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "event": event })),
    ))
}

async fn list_events(
    State(ctx): State<AppContext>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> AppResult<Json<Value>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0).max(0);

    let events = ctx.events.list_events(limit, offset).await?;
    Ok(Json(json!({ "success": true, "events": events })))
}

async fn get_event(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let event = ctx.events.get_event(&id).await?;
    Ok(Json(json!({ "success": true, "event": event })))
}

async fn list_registrations(
    State(ctx): State<AppContext>,
    StaffAuthContext(_auth): StaffAuthContext,
    Path(id): Path<String>,
    ApiQuery(filter): ApiQuery<StatusFilter>,
) -> AppResult<Json<Value>> {
    let status = filter.status.as_deref().map(parse_status_filter).transpose()?;

    // NotFound for unknown events rather than an empty list
    ctx.events.get_event(&id).await?;
    let registrations = ctx.registrations.list_for_event(&id, status).await?;

    Ok(Json(json!({ "success": true, "registrations": registrations })))
}

async fn create_profile(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    ApiJson(req): ApiJson<CreateProfileRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    validate_request(&req)?;

    let profile = ctx
        .events
        .create_profile(NewProfile {
            full_name: req.full_name,
            contact_number: req.contact_number,
            email: req.email,
            address: req.address,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "profile": profile })),
    ))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let profile = ctx.events.get_profile(&id).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::Role,
        test_support::{self, json_request, send},
    };

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(parse_status_filter("pending").unwrap(), RegistrationStatus::Pending);
        assert_eq!(parse_status_filter("APPROVED").unwrap(), RegistrationStatus::Approved);
        assert!(matches!(parse_status_filter("done"), Err(AppError::InvalidStatus(_))));
    }

    #[tokio::test]
    async fn test_create_event_requires_staff() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let body = json!({ "title": "Clean-up Drive", "startsAt": "2026-11-01T08:00:00Z" });

        let (status, _) = send(&ctx, json_request("POST", "/events", None, body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let resident = test_support::bearer(&ctx, Role::Resident);
        let (status, json) =
            send(&ctx, json_request("POST", "/events", Some(&resident), body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "ForbiddenError");

        let staff = test_support::bearer(&ctx, Role::Staff);
        let (status, json) = send(&ctx, json_request("POST", "/events", Some(&staff), body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["event"]["title"], "Clean-up Drive");

        let request = axum::http::Request::get("/events")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, json) = send(&ctx, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["events"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_event_validation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let staff = test_support::bearer(&ctx, Role::Staff);

        let body = json!({ "title": "", "startsAt": "2026-11-01T08:00:00Z" });
        let (status, json) = send(&ctx, json_request("POST", "/events", Some(&staff), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "ValidationError");
    }

    #[tokio::test]
    async fn test_list_registrations_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let event = test_support::seed_event(&ctx.db).await;
        test_support::seed_registration(&ctx.db, &event.id).await;
        let staff = test_support::bearer(&ctx, Role::Staff);

        let uri = format!("/events/{}/registrations?status=pending", event.id);
        let (status, json) = send(&ctx, json_request("GET", &uri, Some(&staff), Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["registrations"].as_array().unwrap().len(), 1);

        let uri = format!("/events/{}/registrations?status=approved", event.id);
        let (_, json) = send(&ctx, json_request("GET", &uri, Some(&staff), Value::Null)).await;
        assert!(json["registrations"].as_array().unwrap().is_empty());

        let uri = "/events/missing/registrations";
        let (status, _) = send(&ctx, json_request("GET", uri, Some(&staff), Value::Null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let resident = test_support::bearer(&ctx, Role::Resident);

        let body = json!({ "fullName": "Juan Dela Cruz", "contactNumber": "09181234567" });
        let (status, json) =
            send(&ctx, json_request("POST", "/profiles", Some(&resident), body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let id = json["profile"]["id"].as_str().unwrap().to_string();
        let uri = format!("/profiles/{}", id);
        let (status, json) = send(&ctx, json_request("GET", &uri, Some(&resident), Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["profile"]["fullName"], "Juan Dela Cruz");

        let body = json!({ "fullName": "Bad Email", "email": "not-an-email" });
        let (status, _) = send(&ctx, json_request("POST", "/profiles", Some(&resident), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
