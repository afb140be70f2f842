//! HTTP endpoint for the extension.
//!
//! The extension's background worker forwards each runtime message as a
//! JSON body and renders the JSON reply.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/messages` | Handle one message (see [`crate::handler`]) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Message failures are reported in the reply body as `{"error": ...}`
//! with status 200, which is what the side panel expects.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so extension pages can
//! call the server directly.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::handler::{handle_message, parse_message, Reply, Services, Session};
use crate::llm::GeminiClient;
use crate::storage::KvStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub services: Services,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/messages", post(handle_messages))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Build the default services from configuration and serve until the
/// process is terminated.
pub async fn run_server(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let store = KvStore::open(&config).await?;
    let model = GeminiClient::new(&config.llm)?;
    let state = AppState {
        session: Arc::new(Session::new()),
        services: Services {
            config: config.clone(),
            store,
            model: Arc::new(model),
        },
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, model = %config.llm.model, "server listening");
    println!("Listening on http://{}", config.server.bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn handle_messages(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Reply> {
    let reply = match parse_message(body) {
        Ok(message) => handle_message(&state.session, &state.services, message).await,
        Err(e) => Reply::error(e),
    };
    Json(reply)
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
