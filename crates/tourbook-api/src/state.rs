//! Application state management
//!
//! One state type per service. Each is built once at startup from an
//! immutable [`AppConfig`] and shared behind an `Arc`.
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthService, CredentialStore, IdentityResolver, TokenService};
use crate::bookings::BookingStore;
use crate::gateway::{default_routes, GatewayRoute};
use crate::remote::{RemoteClient, RemoteError};
use crate::reviews::ReviewStore;
use crate::tours::TourStore;
use std::sync::Arc;
use std::time::Duration;
use tourbook_core::AppConfig;

/// Auth/user service state
pub struct AuthState {
    pub config: AppConfig,
    pub auth: AuthService,
    pub resolver: IdentityResolver,
}

impl AuthState {
    pub fn new(config: AppConfig, store: Arc<dyn CredentialStore>) -> Self {
        let auth = AuthService::new(
            store,
            TokenService::new(&config.tokens),
            config.password.clone(),
        );
        Self {
            resolver: IdentityResolver::new(&config),
            auth,
            config,
        }
    }
}

/// Tour service state
pub struct TourState {
    pub config: AppConfig,
    pub tours: TourStore,
    pub resolver: IdentityResolver,
}

impl TourState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            resolver: IdentityResolver::new(&config),
            tours: TourStore::new(),
            config,
        }
    }
}

/// Booking service state
pub struct BookingState {
    pub config: AppConfig,
    pub bookings: BookingStore,
    pub resolver: IdentityResolver,
}

impl BookingState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            resolver: IdentityResolver::new(&config),
            bookings: BookingStore::new(),
            config,
        }
    }
}

/// Review service state
pub struct ReviewState {
    pub config: AppConfig,
    pub reviews: ReviewStore,
    pub remote: RemoteClient,
    pub resolver: IdentityResolver,
}

impl ReviewState {
    pub fn new(config: AppConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            resolver: IdentityResolver::new(&config),
            remote: RemoteClient::new(&config.remote)?,
            reviews: ReviewStore::new(),
            config,
        })
    }
}

/// Gateway state
pub struct GatewayState {
    pub config: AppConfig,
    pub routes: Vec<GatewayRoute>,
    pub resolver: IdentityResolver,
    /// Upstream client; redirects are passed through to the caller
    pub http: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: AppConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.remote.timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;

        Ok(Self {
            routes: default_routes(&config.services),
            resolver: IdentityResolver::new(&config),
            http,
            config,
        })
    }
}
