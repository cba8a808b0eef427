//! Review handlers
//!
//! Creating a review verifies the author and the tour against their owning
//! services, forwarding the caller's session. The check fails closed: if
//! either service cannot answer, nothing is written and the caller gets 502.

use crate::audit::{audit_log, AuditEvent};
use crate::error::{ApiResponse, AppError};
use crate::remote::{ForwardedSession, VerificationOutcome};
use crate::reviews::{CreateReviewRequest, ReviewStore};
use crate::state::ReviewState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use tourbook_core::Identity;

/// Create a review for a tour
#[utoipa::path(
    post,
    path = "/api/v1/review/{tour_id}",
    tag = "reviews",
    params(("tour_id" = String, Path, description = "Reviewed tour")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = crate::reviews::Review),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 404, description = "User or tour not found", body = crate::error::ApiError),
        (status = 502, description = "Verification unavailable", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_review_handler(
    State(state): State<Arc<ReviewState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Path(tour_id): Path<String>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    ReviewStore::validate(&request)?;

    let session = ForwardedSession::from_headers(&headers);
    let references = state
        .remote
        .verify_review_references(
            &state.config.services,
            &identity.subject_id,
            &tour_id,
            &session,
        )
        .await;

    let mut unavailable = Vec::new();
    for (service, resource_id, outcome) in [
        ("user", &identity.subject_id, &references.user),
        ("tour", &tour_id, &references.tour),
    ] {
        if let VerificationOutcome::Unavailable(reason) = outcome {
            audit_log(&AuditEvent::RemoteVerificationUnavailable {
                service: service.to_string(),
                resource_id: resource_id.clone(),
                reason: reason.clone(),
            });
            unavailable.push(service);
        }
    }
    if !unavailable.is_empty() {
        return Err(AppError::ServiceUnavailable(format!(
            "Could not verify {}",
            unavailable.join(" and ")
        )));
    }

    if references.user == VerificationOutcome::Missing {
        return Err(AppError::NotFound("User".to_string()));
    }
    if references.tour == VerificationOutcome::Missing {
        return Err(AppError::NotFound("Tour".to_string()));
    }

    let review = state
        .reviews
        .create(&identity.subject_id, &tour_id, request)
        .await?;
    tracing::info!(review_id = %review.id, tour_id = %tour_id, "Review created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Review created", review)),
    ))
}

/// Reviews of one tour
#[utoipa::path(
    get,
    path = "/api/v1/review/tour/{tour_id}",
    tag = "reviews",
    params(("tour_id" = String, Path, description = "Tour id")),
    responses(
        (status = 200, description = "Reviews of the tour", body = [crate::reviews::Review]),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_reviews_handler(
    State(state): State<Arc<ReviewState>>,
    Path(tour_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let reviews = state.reviews.for_tour(&tour_id).await;
    Ok(Json(ApiResponse::ok("Reviews retrieved", reviews)))
}
