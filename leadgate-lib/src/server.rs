//! Accept loop and graceful shutdown for the gate listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::admission::Gatekeeper;
use crate::config::Config;
use crate::error::Result;
use crate::telemetry::Metrics;

/// Guard to decrement the active-connection count when dropped
struct ConnectionGuard {
    active: Arc<AtomicUsize>,
    metrics: Option<Arc<Metrics>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_connection_closed();
        }
    }
}

/// Serve the gate until SIGTERM/SIGINT, then drain.
///
/// Every connection runs the same service: hand the request to the
/// gatekeeper, write back whatever it settles on. On shutdown the loop
/// stops accepting and waits up to `timeout.shutdown_secs` for in-flight
/// connections to finish.
pub async fn run(
    config: Arc<Config>,
    gate: Arc<Gatekeeper>,
    metrics: Option<Arc<Metrics>>,
) -> Result<()> {
    let addr = config.listen;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(crate::error::GateError::Io)?;

    let builder = ConnBuilder::new(TokioExecutor::new());
    let active_connections = Arc::new(AtomicUsize::new(0));

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        crate::error::GateError::Io(std::io::Error::other(format!(
            "Failed to setup SIGTERM handler: {e}"
        )))
    })?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(|e| {
        crate::error::GateError::Io(std::io::Error::other(format!(
            "Failed to setup SIGINT handler: {e}"
        )))
    })?;

    info!(?addr, "starting lead-capture gate");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                active_connections.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &metrics {
                    metrics.record_connection_opened();
                }

                let builder = builder.clone();
                let gate = gate.clone();
                let guard = ConnectionGuard {
                    active: active_connections.clone(),
                    metrics: metrics.clone(),
                };

                tokio::spawn(async move {
                    // Counter is decremented when the connection finishes
                    let _guard = guard;

                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let gate = gate.clone();
                        async move { Ok::<_, hyper::Error>(gate.handle(req, Some(peer)).await) }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    info!(
        "Waiting for active connections to finish (timeout: {}s)",
        config.timeout.shutdown_secs
    );
    let shutdown_timeout = Duration::from_secs(config.timeout.shutdown_secs);
    let start = std::time::Instant::now();

    loop {
        let active = active_connections.load(Ordering::Relaxed);
        if active == 0 {
            info!("All connections closed, shutdown complete");
            break;
        }

        if start.elapsed() >= shutdown_timeout {
            warn!(active_connections = active, "Shutdown timeout reached with connections still active");
            break;
        }

        sleep(Duration::from_millis(100)).await;
    }

    info!("Gate server stopped");
    Ok(())
}
