//! Roundtable chat API server.
//!
//! Serves `POST /api/chat` (one user turn in, character replies out) and
//! `GET /health`.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use gemini_gateway::GeminiGateway;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let gateway = Arc::new(GeminiGateway::from_env()?);
    let state = AppState::new(gateway);

    let app = routes::router().with_state(state);

    info!(addr = %config.addr, "Roundtable API listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
