//! Postbox server - contact intake, admin dashboard API and reporting.
//!
//! # API Endpoints
//!
//! - `POST /api/contact` - Submit a contact message
//! - `GET /api/admin/stats` - Aggregate statistics
//! - `GET /api/admin/messages` / `PATCH /api/admin/messages` - Message admin
//! - `GET /api/admin/report` / `POST /api/admin/report` - HTML report / send
//! - `GET /health` - Health check

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use postbox::api::{AppState, router};
use postbox::mailer;
use postbox::rate_limit::RateLimiter;
use postbox::storage::MessageStore;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default data directory if not specified via environment variable.
const DEFAULT_DATA_DIR: &str = "data";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("postbox=info".parse()?))
        .init();

    // Load configuration from environment
    let port: u16 = env::var("POSTBOX_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let data_dir = env::var("POSTBOX_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());

    info!(port, data_dir = %data_dir, "Starting Postbox server");

    let state = AppState {
        store: MessageStore::new(data_dir),
        limiter: Arc::new(RateLimiter::default()),
        mailer: mailer::from_env(),
    };

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Postbox is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
