//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod auth;
pub mod bookings;
pub mod health;
pub mod reviews;
pub mod session;
pub mod tours;
pub mod users;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

/// OpenAPI document for every service
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tourbook API",
        description = "Gateway, auth/user, tour, booking and review services"
    ),
    paths(
        health::health_check,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::me_handler,
        users::get_user_handler,
        users::list_users_handler,
        users::update_user_handler,
        tours::get_tour_handler,
        tours::create_tour_handler,
        bookings::create_booking_handler,
        bookings::get_booking_handler,
        bookings::list_bookings_handler,
        reviews::create_review_handler,
        reviews::list_reviews_handler,
        session::session_handler,
    ),
    components(schemas(
        health::HealthResponse,
        crate::error::ApiError,
        crate::auth::UserView,
        crate::auth::RegisterRequest,
        crate::auth::LoginRequest,
        crate::auth::LoginResponse,
        crate::auth::RefreshRequest,
        crate::auth::RefreshResponse,
        crate::auth::UpdateAccountRequest,
        crate::tours::Tour,
        crate::tours::CreateTourRequest,
        crate::bookings::Booking,
        crate::bookings::CreateBookingRequest,
        crate::reviews::Review,
        crate::reviews::CreateReviewRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration, login and session tokens"),
        (name = "users", description = "User lookup and account management"),
        (name = "tours", description = "Tour catalog"),
        (name = "bookings", description = "Tour bookings"),
        (name = "reviews", description = "Tour reviews"),
        (name = "gateway", description = "Gateway-local endpoints"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// `GET /api-docs/openapi.json`
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
