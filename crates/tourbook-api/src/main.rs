//! Tourbook server
//!
//! One binary, one service per process:
//!
//! ```text
//! tourbook gateway --port 4000
//! tourbook auth --port 4001
//! tourbook tour --port 4003 --config tourbook.toml
//! tourbook booking --port 4004
//! tourbook review --port 4005
//! ```
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tourbook_api::state::{AuthState, BookingState, GatewayState, ReviewState, TourState};
use tourbook_api::{
    auth_router, booking_router, credential_store, gateway_router, review_router, tour_router,
};
use tourbook_core::{AppConfig, LoggingConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tourbook")]
#[command(about = "Tour-booking platform services")]
#[command(version)]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Listen port (defaults to server.port)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    service: Service,
}

#[derive(Subcommand, Clone, Copy)]
enum Service {
    /// Public entry point; verifies tokens and proxies to the services
    Gateway,
    /// Registration, login, tokens and user accounts
    Auth,
    /// Tour catalog
    Tour,
    /// Tour bookings
    Booking,
    /// Tour reviews
    Review,
}

impl Service {
    fn name(self) -> &'static str {
        match self {
            Service::Gateway => "gateway",
            Service::Auth => "auth",
            Service::Tour => "tour",
            Service::Booking => "booking",
            Service::Review => "review",
        }
    }
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{level},tourbook_api={level},tower_http=debug,sqlx=warn",
            level = config.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn build_app(service: Service, config: AppConfig) -> anyhow::Result<Router> {
    let app = match service {
        Service::Gateway => {
            for route in tourbook_api::gateway::default_routes(&config.services) {
                tracing::info!(
                    prefix = %route.prefix,
                    upstream = %route.upstream,
                    protected = route.protected,
                    "Gateway route"
                );
            }
            gateway_router(Arc::new(GatewayState::new(config)?))
        }
        Service::Auth => {
            let store = credential_store(&config.database)
                .await
                .context("Failed to open credential store")?;
            auth_router(Arc::new(AuthState::new(config, store)))
        }
        Service::Tour => tour_router(Arc::new(TourState::new(config))),
        Service::Booking => booking_router(Arc::new(BookingState::new(config))),
        Service::Review => review_router(Arc::new(ReviewState::new(config)?)),
    };
    Ok(app)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = load_config(cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config.logging);

    if config.uses_development_secrets() {
        tracing::warn!(
            "Token secrets are the built-in development keys; set SECRET_KEY_ACCESS_TOKEN and SECRET_KEY_REFRESH_TOKEN"
        );
    }
    if config.identity.gateway_secret.is_none() {
        tracing::warn!("GATEWAY_SHARED_SECRET not set; identity headers are trusted unsigned");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let service = cli.service;
    let app = build_app(service, config).await?;

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Tourbook {} service starting on http://{}", service.name(), addr);
    if matches!(service, Service::Gateway) {
        tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);
    }

    axum::serve(listener, app).await?;

    Ok(())
}
