//! Booking handlers

use crate::auth::{authorize, AccessPolicy};
use crate::bookings::CreateBookingRequest;
use crate::error::{ApiResponse, AppError};
use crate::state::BookingState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use tourbook_core::Identity;

/// Book a tour for the calling user
#[utoipa::path(
    post,
    path = "/api/v1/booking",
    tag = "bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Tour booked", body = crate::bookings::Booking),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_booking_handler(
    State(state): State<Arc<BookingState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.bookings.create(&identity.subject_id, request).await?;
    tracing::info!(
        booking_id = %booking.id,
        user_id = %booking.user_id,
        tour_id = %booking.tour_id,
        "Tour booked"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Your tour is booked", booking)),
    ))
}

/// Get a booking (owner or ADMIN)
#[utoipa::path(
    get,
    path = "/api/v1/booking/{id}",
    tag = "bookings",
    params(("id" = String, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking found", body = crate::bookings::Booking),
        (status = 403, description = "Not the owner", body = crate::error::ApiError),
        (status = 404, description = "Booking not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_booking_handler(
    State(state): State<Arc<BookingState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.bookings.get(&id).await?;
    authorize(
        &identity,
        AccessPolicy::OwnerOrAdmin(&booking.user_id),
        &headers,
        &format!("/api/v1/booking/{id}"),
    )?;

    Ok(Json(ApiResponse::ok("Booking retrieved", booking)))
}

/// List all bookings (ADMIN)
#[utoipa::path(
    get,
    path = "/api/v1/booking",
    tag = "bookings",
    responses(
        (status = 200, description = "All bookings", body = [crate::bookings::Booking]),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_bookings_handler(
    State(state): State<Arc<BookingState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    authorize(&identity, AccessPolicy::AdminOnly, &headers, "/api/v1/booking")?;

    let bookings = state.bookings.list().await;
    Ok(Json(ApiResponse::ok("Bookings retrieved", bookings)))
}
