//! HTTP gateway for Sahayak.
//!
//! A thin axum layer over [`AppContext`]: every handler parses the request,
//! calls one facade operation and maps its error kind to a status.
//! See [`sahayak`] and [`calendar`] for the routes.

pub mod calendar;
pub mod error;
pub mod sahayak;

#[cfg(test)]
pub(crate) mod test_support;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use sahayak_config::AppConfig;
use sahayak_runtime::AppContext;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

pub type SharedContext = Arc<AppContext>;

/// Build the router with all routes and layers.
///
/// - request bodies capped at `gateway.max_upload_bytes`
/// - CORS for browser clients
/// - HTTP trace logging
pub fn build_router(ctx: SharedContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/sahayak", sahayak::router())
        .nest("/calendar", calendar::router())
        .layer(DefaultBodyLimit::max(ctx.config.gateway.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Build the context, resolve the deployment and serve until shutdown.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = AppContext::from_config(config)?;
    ctx.start().await?;
    serve(Arc::new(ctx)).await
}

/// Serve an already started context on `gateway.host:gateway.port`.
pub async fn serve(ctx: SharedContext) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", ctx.config.gateway.host, ctx.config.gateway.port);
    let app = build_router(ctx);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
