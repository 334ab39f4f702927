/// API routes and handlers
pub mod admin;
pub mod events;
pub mod health;
pub mod middleware;
pub mod otp;
pub mod qr;
pub mod registrations;
pub mod session;

use crate::{
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{FromRequest, FromRequestParts},
    Router,
};
use validator::Validate;

/// JSON body whose rejections render as `AppError`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections render as `AppError`
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(events::routes())
        .merge(registrations::routes())
        .merge(otp::routes())
        .merge(qr::routes())
        .merge(session::routes())
        .merge(admin::routes())
}

/// Run derived field validation on a request body
pub(crate) fn validate_request<T: Validate>(req: &T) -> AppResult<()> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string().replace('\n', "; ")))
}
