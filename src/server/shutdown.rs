//! Graceful shutdown with connection draining

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use crate::error::ErrorResponse;

/// Tracks in-flight requests so shutdown can wait for them
#[derive(Debug)]
pub struct ShutdownState {
    in_flight: AtomicU64,
    draining: AtomicBool,
    drain_timeout: Duration,
}

impl ShutdownState {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            in_flight: AtomicU64::new(0),
            draining: AtomicBool::new(false),
            drain_timeout,
        }
    }

    pub fn request_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub fn request_completed(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    pub fn start_drain(&self) {
        info!("shutdown.drain");
        self.draining.store(true, Ordering::SeqCst);
    }

    /// Wait until nothing is in flight or the drain timeout passes.
    ///
    /// Requests hung by a `TIMEOUT` fault never finish, so the timeout
    /// is what ends the drain in that case.
    pub async fn wait_for_drain(&self) {
        let started = Instant::now();
        while self.in_flight_count() > 0 {
            if started.elapsed() > self.drain_timeout {
                warn!(remaining = self.in_flight_count(), "shutdown.drain_timeout");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        info!("shutdown.drained");
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Decrements the in-flight count even when the response future is dropped
struct InFlight<'a>(&'a ShutdownState);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.request_completed();
    }
}

/// Reject new work while draining and count what is in flight
pub async fn request_tracking_middleware(
    State(shutdown): State<Arc<ShutdownState>>,
    request: Request,
    next: Next,
) -> Response {
    if shutdown.is_draining() {
        let body = ErrorResponse::new(
            "service_unavailable",
            "Server is shutting down. Please retry your request.",
        );
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    shutdown.request_started();
    let _guard = InFlight(shutdown.as_ref());
    next.run(request).await
}

/// Resolves on Ctrl+C or SIGTERM, after draining
pub async fn graceful_shutdown(shutdown: Arc<ShutdownState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "shutdown.ctrl_c_unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "shutdown.sigterm_unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("shutdown.signal ctrl_c"),
        _ = terminate => info!("shutdown.signal sigterm"),
    }

    shutdown.start_drain();
    shutdown.wait_for_drain().await;
}
