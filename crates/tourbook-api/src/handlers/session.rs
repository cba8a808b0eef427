//! Gateway-local session endpoint

use crate::error::{ApiResponse, AppError};
use axum::{response::IntoResponse, Extension, Json};
use tourbook_core::Identity;

/// The identity the gateway resolved for this request
#[utoipa::path(
    get,
    path = "/api/v1/session",
    tag = "gateway",
    responses(
        (status = 200, description = "Verified caller identity"),
        (status = 401, description = "No valid access token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn session_handler(
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ApiResponse::ok("Session active", identity)))
}
