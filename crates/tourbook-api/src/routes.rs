//! API route definitions
//!
//! One router per service. Every service serves `/health` and traces
//! requests; identity is enforced per route group with route layers.
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::{optional_identity, require_admin, require_identity};
use crate::gateway::{proxy_handler, require_gateway_identity};
use crate::handlers::{auth, bookings, health, openapi_json, reviews, session, tours, users};
use crate::state::{AuthState, BookingState, GatewayState, ReviewState, TourState};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

fn service_router(api: Router, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
}

/// Auth/user service
pub fn auth_router(state: Arc<AuthState>) -> Router {
    let resolver = state.resolver.clone();

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/v1/auth/register", post(auth::register_handler))
        .route("/api/v1/auth/login", post(auth::login_handler));

    // Refresh works from the refresh token alone; a caller is attached if known
    let refresh_routes = Router::new()
        .route("/api/v1/auth/refresh-token", post(auth::refresh_handler))
        .route_layer(middleware::from_fn_with_state(
            resolver.clone(),
            optional_identity,
        ));

    // Protected routes; owner and admin checks happen in the handlers
    let protected_routes = Router::new()
        .route("/api/v1/auth/logout", post(auth::logout_handler))
        .route("/api/v1/auth/me", get(auth::me_handler))
        .route(
            "/api/v1/user/:id",
            get(users::get_user_handler).patch(users::update_user_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            resolver.clone(),
            require_identity,
        ));

    let admin_routes = Router::new()
        .route("/api/v1/user", get(users::list_users_handler))
        .route_layer(middleware::from_fn_with_state(resolver, require_admin));

    let api = Router::new()
        .merge(public_routes)
        .merge(refresh_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state.clone());

    service_router(api, state.config.server.max_body_size)
}

/// Tour service
pub fn tour_router(state: Arc<TourState>) -> Router {
    let resolver = state.resolver.clone();

    let protected_routes = Router::new()
        .route("/api/v1/tour/:id", get(tours::get_tour_handler))
        .route_layer(middleware::from_fn_with_state(
            resolver.clone(),
            require_identity,
        ));

    let admin_routes = Router::new()
        .route("/api/v1/tour", post(tours::create_tour_handler))
        .route_layer(middleware::from_fn_with_state(resolver, require_admin));

    let api = Router::new()
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state.clone());

    service_router(api, state.config.server.max_body_size)
}

/// Booking service; the admin check for listing happens in the handler
pub fn booking_router(state: Arc<BookingState>) -> Router {
    let api = Router::new()
        .route(
            "/api/v1/booking",
            get(bookings::list_bookings_handler).post(bookings::create_booking_handler),
        )
        .route("/api/v1/booking/:id", get(bookings::get_booking_handler))
        .route_layer(middleware::from_fn_with_state(
            state.resolver.clone(),
            require_identity,
        ))
        .with_state(state.clone());

    service_router(api, state.config.server.max_body_size)
}

/// Review service
pub fn review_router(state: Arc<ReviewState>) -> Router {
    let api = Router::new()
        .route("/api/v1/review/:tour_id", post(reviews::create_review_handler))
        .route(
            "/api/v1/review/tour/:tour_id",
            get(reviews::list_reviews_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.resolver.clone(),
            require_identity,
        ))
        .with_state(state.clone());

    service_router(api, state.config.server.max_body_size)
}

/// Gateway: local session and docs endpoints, everything else proxied
pub fn gateway_router(state: Arc<GatewayState>) -> Router {
    let session_routes = Router::new()
        .route("/api/v1/session", get(session::session_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_gateway_identity,
        ));

    let api = Router::new()
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(session_routes)
        .fallback(proxy_handler)
        .with_state(state.clone());

    // The proxy reads bodies itself up to the same limit
    service_router(api, state.config.server.max_body_size)
}
