/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{AppError, AppResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    response::IntoResponse,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Headroom for multipart framing and text fields around the photo
const BODY_OVERHEAD: usize = 64 * 1024;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let body_limit = ctx.config.uploads.max_upload_size + BODY_OVERHEAD;

    Router::new()
        .merge(crate::api::routes())
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> impl IntoResponse {
    AppError::NotFound("Endpoint not found".to_string())
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> AppResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Barangay event registration service listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());
    info!("   Environment: {}", ctx.config.service.environment);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        auth::Role,
        test_support::{self, json_request, send},
    };
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;

        let (status, json) = send(&ctx, json_request("GET", "/nowhere", None, Value::Null)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "NotFoundError");
    }

    #[tokio::test]
    async fn test_missing_body_field_is_json_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let staff = test_support::bearer(&ctx, Role::Staff);

        let (status, json) =
            send(&ctx, json_request("POST", "/qr/scan", Some(&staff), json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "ValidationError");
        assert!(json["message"].as_str().unwrap().contains("qrValue"));

        let body = json!({ "registrationId": "x" });
        let (status, json) = send(&ctx, json_request("POST", "/otp/verify", None, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "ValidationError");

        let body = json!({ "decision": "approved" });
        let (status, json) = send(
            &ctx,
            json_request("POST", "/registrations/any/approval", Some(&staff), body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "ValidationError");
    }

    #[tokio::test]
    async fn test_malformed_query_is_json_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;

        let (status, json) =
            send(&ctx, json_request("GET", "/events?limit=lots", None, Value::Null)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "ValidationError");
    }

    #[tokio::test]
    async fn test_oversized_body_is_json_413() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let staff = test_support::bearer(&ctx, Role::Staff);

        let oversized = "x".repeat(ctx.config.uploads.max_upload_size + 128 * 1024);
        let body = json!({ "qrValue": oversized });
        let (status, json) = send(&ctx, json_request("POST", "/qr/scan", Some(&staff), body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "PayloadTooLarge");
    }

    #[tokio::test]
    async fn test_otp_endpoints_are_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::test_context(dir.path()).await;
        let body = serde_json::json!({ "registrationId": "missing" });

        let mut limited = false;
        for _ in 0..40 {
            let (status, json) =
                send(&ctx, json_request("POST", "/otp/send", None, body.clone())).await;
            if status == StatusCode::TOO_MANY_REQUESTS {
                assert_eq!(json["error"], "RateLimitExceeded");
                limited = true;
                break;
            }
        }
        assert!(limited);
    }
}
