/// Shared fixtures for unit tests
use crate::{
    db::models::{Event, Profile, Registration},
    events::{EventManager, NewEvent, NewProfile},
    registration::{NewRegistration, RegistrationStore},
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

pub async fn seed_event(pool: &SqlitePool) -> Event {
    EventManager::new(pool.clone())
        .create_event(NewEvent {
            title: "Libreng Bakuna".to_string(),
            description: None,
            venue: Some("Barangay Hall".to_string()),
            starts_at: Utc::now() + Duration::days(3),
            ends_at: None,
        })
        .await
        .unwrap()
}

pub async fn seed_profile(pool: &SqlitePool) -> Profile {
    EventManager::new(pool.clone())
        .create_profile(NewProfile {
            full_name: "Maria Santos".to_string(),
            contact_number: Some("09171234567".to_string()),
            email: None,
            address: None,
        })
        .await
        .unwrap()
}

pub async fn seed_registration(pool: &SqlitePool, event_id: &str) -> Registration {
    RegistrationStore::new(pool.clone())
        .create(NewRegistration {
            event_id: event_id.to_string(),
            profile_id: None,
            contact_number: Some("09171234567".to_string()),
            custom_values: serde_json::json!({}),
            photo_path: None,
        })
        .await
        .unwrap()
}

/// Context over an in-memory database with uploads under `upload_dir`
pub async fn test_context(upload_dir: &std::path::Path) -> crate::context::AppContext {
    let config = crate::config::ServerConfig::for_tests(upload_dir);
    let pool = crate::db::test_pool().await;
    crate::context::AppContext::with_pool(config, pool).unwrap()
}

/// `Authorization` header value for a caller with the given role
pub fn bearer(ctx: &crate::context::AppContext, role: crate::auth::Role) -> String {
    let token = crate::auth::issue_token(
        &ctx.config.authentication.jwt_secret,
        &format!("{}-user", role.as_str()),
        role,
        3600,
    );
    format!("Bearer {}", token)
}

/// Run one request through the full router and decode the JSON body
pub async fn send(
    ctx: &crate::context::AppContext,
    request: axum::http::Request<axum::body::Body>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use tower::ServiceExt;

    let app = crate::server::build_router(ctx.clone());
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// JSON request with an optional bearer header
pub fn json_request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}
