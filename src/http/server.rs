//! HTTP server for the gateway.

use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::admission::{AdmissionPipeline, FieldCatalog};
use crate::error::Result;
use crate::graphql::GatewaySchema;

use super::handler::graphql_handler;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub schema: GatewaySchema,
    pub pipeline: Arc<AdmissionPipeline>,
    pub catalog: Arc<FieldCatalog>,
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route("/graphql", post(graphql_handler))
        .with_state(state)
}

async fn info_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Turnstile GraphQL gateway",
        "graphql": "/graphql",
        "health": "OK",
    }))
}

/// Serve until the shutdown signal resolves.
pub async fn serve_with_shutdown<F>(addr: SocketAddr, state: AppState, signal: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(signal)
        .await?;

    Ok(())
}
