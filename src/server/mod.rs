//! HTTP server
//!
//! Axum router exposing the OpenAI and Gemini compatible endpoints, the
//! emulator admin routes and configured HTTP mocks.

mod handlers;
mod middleware;
mod routes;
mod state;
mod streaming;
pub mod shutdown;

pub use handlers::*;
pub use middleware::*;
pub use routes::*;
pub use shutdown::*;
pub use state::*;
pub use streaming::*;

use axum::extract::DefaultBodyLimit;
use axum::{middleware::from_fn, middleware::from_fn_with_state, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

use crate::config::EmulatorConfig;
use crate::engine::EmulatorEngine;
use crate::handlers::HandlerRegistry;
use crate::telemetry::init_telemetry;

/// Run the emulator until Ctrl+C or SIGTERM
pub async fn run_server(config: EmulatorConfig, registry: HandlerRegistry) -> anyhow::Result<()> {
    if let Err(e) = init_telemetry(&config.telemetry) {
        eprintln!("telemetry not initialized: {e}");
    }

    let addr = config.server.socket_addr()?;
    let engine = EmulatorEngine::new(config, registry)?;
    let state = AppState::new(engine);
    let shutdown = state.shutdown.clone();
    let app = create_router(state.clone());

    let config = state.config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        env = %config.env,
        cases = config.cases.len(),
        scenarios = config.scenarios.len(),
        http_mocks = config.http_mocks.len(),
        active_scenario = ?state.engine.scenarios().active_id(),
        "server.start"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown(shutdown))
        .await?;

    info!("server.stop");
    Ok(())
}

/// Build the router with its middleware stack
pub fn create_router(state: AppState) -> Router {
    let server = &state.config().server;
    let telemetry = &state.config().telemetry;

    let mut router = Router::new()
        .merge(routes::openai_routes())
        .merge(routes::gemini_routes())
        .merge(routes::admin_routes());
    if telemetry.metrics_enabled {
        router = router.merge(routes::health_routes(&telemetry.metrics_path));
    } else {
        router = router.route("/health", axum::routing::get(handlers::health_check));
    }

    let mut router = router
        .fallback(handlers::http_mock)
        .layer(from_fn_with_state(state.clone(), http_metrics_middleware))
        .layer(from_fn_with_state(state.shutdown.clone(), request_tracking_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes));

    if server.request_logging {
        router = router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));
    }
    if server.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}
