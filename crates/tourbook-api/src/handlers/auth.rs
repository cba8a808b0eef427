//! Authentication API handlers
//!
//! Registration, login, refresh, logout and the caller's own profile.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::auth::cookies::{clear_session_cookies, read_cookie, set_access_cookie, set_session_cookies};
use crate::auth::identity::bearer_token;
use crate::auth::{
    AuthError, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, RegisterRequest,
};
use crate::error::{ApiResponse, AppError};
use crate::state::AuthState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use tourbook_core::Identity;
use validator::Validate;

/// Register a new user account
///
/// Role defaults to USER; status starts Active. No tokens are issued.
///
/// # Responses
///
/// * `201 Created` - Sanitized user view
/// * `400 Bad Request` - Invalid input
/// * `409 Conflict` - Email or username already taken
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = crate::auth::UserView),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email or username taken", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    let email = request.email.clone();

    match state.auth.register(request).await {
        Ok(user) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id.clone(),
                email: user.email.clone(),
                role: user.role.to_string(),
                ip_address: ctx.ip_address,
                user_agent: ctx.user_agent,
            });
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok("User registered successfully", user)),
            ))
        }
        Err(err) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: err.to_string(),
                ip_address: ctx.ip_address,
                user_agent: ctx.user_agent,
            });
            Err(err.into())
        }
    }
}

/// Login with username and password
///
/// Sets `accessToken` and `refreshToken` cookies and returns the same tokens
/// in the body. Every credential failure answers "Invalid credentials".
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let ctx = AuditContext::from_headers(&headers);

    let outcome = match state.auth.login(&request.username, &request.password).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if let AuthError::InvalidCredentials { reason } = &err {
                audit_log(&AuditEvent::LoginFailure {
                    username: request.username.clone(),
                    reason: (*reason).to_string(),
                    ip_address: ctx.ip_address,
                    user_agent: ctx.user_agent,
                });
            }
            return Err(err.into());
        }
    };

    audit_log(&AuditEvent::LoginSuccess {
        user_id: outcome.user.id.clone(),
        username: outcome.user.username.clone(),
        ip_address: ctx.ip_address,
        user_agent: ctx.user_agent,
    });

    let tokens = state.auth.tokens();
    let mut response_headers = HeaderMap::new();
    set_session_cookies(
        &mut response_headers,
        &state.config.cookies,
        &outcome.tokens.access_token,
        tokens.access_ttl_secs(),
        &outcome.tokens.refresh_token,
        tokens.refresh_ttl_secs(),
    );

    let body = LoginResponse {
        user: outcome.user,
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
    };

    Ok((
        response_headers,
        Json(ApiResponse::ok("Login successful", body)),
    ))
}

/// Exchange the refresh token for a new access token
///
/// The refresh token is read from the `refreshToken` cookie, then the JSON
/// body, then a Bearer header. A Bearer value that is a valid access token
/// is skipped. The subject is the authenticated caller
/// when there is one, otherwise the refresh token's own subject.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh-token",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AuthState>>,
    caller: Option<Extension<Identity>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = AuditContext::from_headers(&headers);
    let rejected = |user_id: Option<String>, reason: String| {
        audit_log(&AuditEvent::RefreshRejected {
            user_id,
            reason,
            ip_address: ctx.ip_address.clone(),
        });
        AppError::Unauthenticated("Invalid refresh token".to_string())
    };

    let tokens = state.auth.tokens();
    let presented = read_cookie(&headers, &state.config.cookies.refresh_name)
        .filter(|t| !t.is_empty())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers).filter(|t| tokens.verify_access(t).is_err()))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| rejected(None, "no refresh token presented".to_string()))?;

    let subject_id = match caller {
        Some(Extension(identity)) => identity.subject_id,
        None => {
            state
                .auth
                .tokens()
                .verify_refresh(&presented)
                .map_err(|e| rejected(None, e.to_string()))?
                .sub
        }
    };

    let access_token = match state.auth.refresh(&subject_id, &presented).await {
        Ok(token) => token,
        Err(AuthError::RefreshRejected { reason }) => {
            return Err(rejected(Some(subject_id), reason));
        }
        Err(err) => return Err(err.into()),
    };

    audit_log(&AuditEvent::TokenRefresh {
        user_id: subject_id,
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
    });

    let mut response_headers = HeaderMap::new();
    set_access_cookie(
        &mut response_headers,
        &state.config.cookies,
        &access_token,
        state.auth.tokens().access_ttl_secs(),
    );

    Ok((
        response_headers,
        Json(ApiResponse::ok(
            "Access token refreshed",
            RefreshResponse { access_token },
        )),
    ))
}

/// Logout: clear the stored refresh token and both cookies
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out successfully"),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AuthState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(&identity.subject_id).await?;

    audit_log(&AuditEvent::Logout {
        user_id: identity.subject_id,
        ip_address: AuditContext::from_headers(&headers).ip_address,
    });

    let mut response_headers = HeaderMap::new();
    clear_session_cookies(&mut response_headers, &state.config.cookies);

    Ok((
        response_headers,
        Json(ApiResponse::message("Logged out successfully")),
    ))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = crate::auth::UserView),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AuthState>>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.get_user(&identity.subject_id).await?;
    Ok(Json(ApiResponse::ok("User retrieved", user)))
}
