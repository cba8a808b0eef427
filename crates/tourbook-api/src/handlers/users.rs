//! User lookup and admin account management
//!
//! `GET /api/v1/user/:id` is also the endpoint other services call to
//! verify that a user exists.

use crate::audit::{audit_log, AuditEvent};
use crate::auth::{authorize, AccessPolicy, UpdateAccountRequest};
use crate::error::{ApiResponse, AppError};
use crate::state::AuthState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use tourbook_core::Identity;

/// Get a user by id (owner or ADMIN)
#[utoipa::path(
    get,
    path = "/api/v1/user/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = crate::auth::UserView),
        (status = 403, description = "Not the owner", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_handler(
    State(state): State<Arc<AuthState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    authorize(
        &identity,
        AccessPolicy::OwnerOrAdmin(&id),
        &headers,
        &format!("/api/v1/user/{id}"),
    )?;

    let user = state.auth.get_user(&id).await?;
    Ok(Json(ApiResponse::ok("User retrieved", user)))
}

/// List all users (ADMIN)
#[utoipa::path(
    get,
    path = "/api/v1/user",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = [crate::auth::UserView]),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AuthState>>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.auth.list_users().await?;
    Ok(Json(ApiResponse::ok("Users retrieved", users)))
}

/// Change a user's role and/or status (ADMIN)
///
/// Moving an account out of Active clears its refresh token.
#[utoipa::path(
    patch,
    path = "/api/v1/user/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = crate::auth::UserView),
        (status = 400, description = "Nothing to update", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user_handler(
    State(state): State<Arc<AuthState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(
        &identity,
        AccessPolicy::AdminOnly,
        &headers,
        &format!("/api/v1/user/{id}"),
    )?;

    let user = state
        .auth
        .update_account(&id, request.role, request.status)
        .await?;

    audit_log(&AuditEvent::AccountUpdated {
        user_id: user.id.clone(),
        updated_by: identity.subject_id,
        role: request.role.map(|r| r.to_string()),
        status: request.status.map(|s| s.to_string()),
    });

    Ok(Json(ApiResponse::ok("Account updated", user)))
}
