//! Tour handlers

use crate::error::{ApiResponse, AppError};
use crate::state::TourState;
use crate::tours::CreateTourRequest;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Get a tour by id; also used for remote existence checks
#[utoipa::path(
    get,
    path = "/api/v1/tour/{id}",
    tag = "tours",
    params(("id" = String, Path, description = "Tour id")),
    responses(
        (status = 200, description = "Tour found", body = crate::tours::Tour),
        (status = 404, description = "Tour not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_tour_handler(
    State(state): State<Arc<TourState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tour = state.tours.get(&id).await?;
    Ok(Json(ApiResponse::ok("Tour retrieved", tour)))
}

/// Create a tour (ADMIN)
#[utoipa::path(
    post,
    path = "/api/v1/tour",
    tag = "tours",
    request_body = CreateTourRequest,
    responses(
        (status = 201, description = "Tour created", body = crate::tours::Tour),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 409, description = "Title taken", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_tour_handler(
    State(state): State<Arc<TourState>>,
    Json(request): Json<CreateTourRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tour = state.tours.create(request).await?;
    tracing::info!(tour_id = %tour.id, title = %tour.title, "Tour created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Tour created", tour)),
    ))
}
