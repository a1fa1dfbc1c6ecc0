use anyhow::{Context, Result};
use axum::{Router, extract::FromRef};
use reqwest::Client;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api_client::ApiClient;
use crate::config::Settings;
use crate::geo::GeoResolver;
use crate::session::SessionRegistry;

// Declare modules
mod api_client;
mod auth_middleware;
mod config;
mod error;
mod feed;
mod geo;
mod models;
mod notify;
mod onboarding;
mod relevance;
mod routes;
mod saved_searches;
mod session;
mod timefmt;
mod wishlist;

#[cfg(test)]
mod tests;

// Shared application state, injected into every handler. The single
// reqwest client lives inside ApiClient; nothing configures HTTP behaviour
// globally.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub api: Arc<ApiClient>,
    pub sessions: Arc<SessionRegistry>,
    pub geo: Arc<GeoResolver>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketfront=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing marketfront server...");

    // Load configuration
    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let shared_settings = Arc::new(settings);

    // One shared HTTP client for the backend API and the geocoder.
    let http_client = Client::builder()
        .user_agent(concat!("marketfront/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build shared reqwest client")?;
    let api = Arc::new(ApiClient::new(http_client, &shared_settings.api_url));
    tracing::info!("Backend API client ready for {}", shared_settings.api_url);

    let geo = Arc::new(GeoResolver::new(
        &shared_settings.geocode_url,
        &shared_settings.cache_dir,
    ));

    let app_state = AppState {
        settings: shared_settings.clone(),
        api,
        sessions: Arc::new(SessionRegistry::new()),
        geo,
    };

    let router: Router = routes::create_router(app_state.clone());

    // Combine the router with static file serving
    let app = router.nest_service("/static", ServeDir::new("static"));

    // Parse the server address from settings
    let addr: SocketAddr = match shared_settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(
                "Invalid server address format in configuration ('{}'): {}",
                shared_settings.server_address,
                e
            );
            return Err(anyhow::anyhow!(
                "Invalid server address format: {}",
                shared_settings.server_address
            ));
        }
    };

    // Create a TCP listener
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    // Run the server
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
