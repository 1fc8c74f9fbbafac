//! HTTP surface: estimation endpoints behind per-client rate limiting,
//! plus an unthrottled health check.

pub mod error;
pub mod handlers;
pub mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::estimation::{EstimationDefaults, EstimationPipeline};
use crate::rate_limit::RateLimiter;
use crate::storage::Storage;

pub use error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EstimationPipeline>,
    pub limiter: RateLimiter,
    pub defaults: Arc<EstimationDefaults>,
}

impl AppState {
    pub fn new(pipeline: EstimationPipeline, limiter: RateLimiter, defaults: EstimationDefaults) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            limiter,
            defaults: Arc::new(defaults),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let estimate_routes = Router::new()
        .route("/estimate-repo-issues", post(handlers::estimate_repo_issues))
        .route("/estimate-issue", post(handlers::estimate_issue))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ));

    Router::new()
        .merge(estimate_routes)
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &Config) -> Result<()> {
    let storage = match Storage::new(&config.database_path) {
        Ok(storage) => Some(Arc::new(storage)),
        Err(e) => {
            tracing::warn!(
                "Results store at {} unavailable, runs will not be saved: {}",
                config.database_path,
                e
            );
            None
        }
    };

    let pipeline = EstimationPipeline::from_config(config, storage)?;
    let limiter = RateLimiter::new(config.rate_limit_config());
    let state = AppState::new(pipeline, limiter.clone(), config.estimation_defaults());

    let sweeper = limiter.spawn_sweeper();

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
