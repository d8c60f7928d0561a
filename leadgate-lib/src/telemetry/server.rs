use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Start the observability server that handles metrics and health checks
/// This server runs on a dedicated port and serves:
/// - `/metrics` - Prometheus metrics
/// - `/health` - Health check endpoint
/// - `/ready` - Readiness check endpoint
/// - `/live` - Liveness check endpoint
pub async fn start_observability_server(
    port: u16,
    registry: Registry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(?addr, "observability server started (metrics + health checks)");

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("observability server: received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("observability server: received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "observability server: accept error");
                        continue;
                    }
                };

                let registry = registry.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = registry.clone();
                        async move { Ok::<_, hyper::Error>(respond(req.uri().path(), &registry)) }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "observability server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("observability server stopped");
    Ok(())
}

/// The health triad answers statically: this server is only started after
/// the gate listener is bound, so a process that answers here is serving.
fn respond(path: &str, registry: &Registry) -> Response<RespBody> {
    match path {
        "/metrics" => match render_metrics(registry) {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "metrics encoding failed");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        },
        "/health" => status_json("healthy"),
        "/live" => status_json("alive"),
        "/ready" => status_json("ready"),
        _ => plain(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Gather the registry and render it in the Prometheus text format.
fn render_metrics(registry: &Registry) -> Result<Response<RespBody>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;

    let mut resp = Response::new(full(Bytes::from(buffer)));
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static(prometheus::TEXT_FORMAT),
    );
    Ok(resp)
}

fn status_json(status: &str) -> Response<RespBody> {
    let bytes =
        serde_json::to_vec(&json!({ "status": status })).unwrap_or_else(|_| b"{}".to_vec());
    let mut resp = Response::new(full(Bytes::from(bytes)));
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    resp
}

fn plain(status: StatusCode, message: &'static str) -> Response<RespBody> {
    let mut resp = Response::new(full(Bytes::from_static(message.as_bytes())));
    *resp.status_mut() = status;
    resp
}

fn full(bytes: Bytes) -> RespBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respond_serves_health_triad_and_metrics() {
        let registry = Registry::default();

        for path in ["/health", "/live", "/ready", "/metrics"] {
            assert_eq!(respond(path, &registry).status(), StatusCode::OK, "path {path}");
        }
        assert_eq!(respond("/nope", &registry).status(), StatusCode::NOT_FOUND);
    }
}
