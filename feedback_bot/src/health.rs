//! Tiny HTTP server for uptime monitors to poke.

use axum::{routing::get, Json, Router};
use chrono::Utc;
use tokio::net::TcpListener;

/// GET /: says the bot is up.
async fn home() -> &'static str {
    "Telegram Feedback Bot is running!"
}

/// GET /health: liveness check.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
}

/// Serves [`router`] on `listener` until the process ends.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Health endpoint listening on {addr}");
    }
    axum::serve(listener, router()).await
}
