//! Tourbook API - gateway and services
//!
//! HTTP surfaces of the tour-booking platform and the protocol that ties
//! them together: token issuing and verification, identity propagation from
//! the gateway, role gates and remote existence checks.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod remote;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod tours;

pub use routes::{auth_router, booking_router, gateway_router, review_router, tour_router};

use auth::{CredentialStore, InMemoryCredentialStore, PgCredentialStore, StoreError};
use std::sync::Arc;
use tourbook_core::DatabaseConfig;

/// Postgres when a database URL is configured, otherwise in memory
pub async fn credential_store(
    config: &DatabaseConfig,
) -> Result<Arc<dyn CredentialStore>, StoreError> {
    if config.url.as_deref().is_some_and(|url| !url.is_empty()) {
        Ok(Arc::new(PgCredentialStore::connect(config).await?))
    } else {
        tracing::warn!("No DATABASE_URL configured; credentials are kept in memory");
        Ok(Arc::new(InMemoryCredentialStore::new()))
    }
}

/// Test helpers shared by unit and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use crate::state::{AuthState, BookingState, GatewayState, ReviewState, TourState};
    use axum::Router;
    use tourbook_core::{AppConfig, PasswordConfig};

    /// Default config with cheap password hashing and non-Secure cookies
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.password = PasswordConfig {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
            output_len: None,
        };
        config.cookies.secure = false;
        config
    }

    pub fn auth_state_for_testing(config: AppConfig) -> Arc<AuthState> {
        Arc::new(AuthState::new(
            config,
            Arc::new(InMemoryCredentialStore::new()),
        ))
    }

    /// Auth/user router over an in-memory store
    pub fn create_router_for_testing() -> Router {
        auth_router(auth_state_for_testing(test_config()))
    }

    pub fn create_tour_router_for_testing(config: AppConfig) -> (Router, Arc<TourState>) {
        let state = Arc::new(TourState::new(config));
        (tour_router(state.clone()), state)
    }

    pub fn create_booking_router_for_testing(config: AppConfig) -> Router {
        booking_router(Arc::new(BookingState::new(config)))
    }

    pub fn create_review_router_for_testing(config: AppConfig) -> Router {
        let state = ReviewState::new(config).unwrap_or_else(|e| panic!("review state: {e}"));
        review_router(Arc::new(state))
    }

    pub fn create_gateway_router_for_testing(config: AppConfig) -> Router {
        let state = GatewayState::new(config).unwrap_or_else(|e| panic!("gateway state: {e}"));
        gateway_router(Arc::new(state))
    }
}

#[cfg(feature = "test-utils")]
pub use test_utils::create_router_for_testing;
