#![forbid(unsafe_code)]

use clap::Parser;
use leadgate_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use leadgate_lib::{
    load_from_path, spawn_sweeper, Gatekeeper, InMemoryRateStore, MemoryStore, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Admission gate for the lead-capture API")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "leadgate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&cfg.logging, &cfg.telemetry.otel_log_level) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    info!(
        ?cfg.listen,
        admin_enabled = cfg.admin.token.is_some(),
        "configuration loaded"
    );

    let metrics = match cfg.telemetry.metrics_port {
        Some(port) => match init_metrics() {
            Ok((metrics, registry)) => {
                tokio::spawn(async move {
                    if let Err(err) = start_observability_server(port, registry).await {
                        error!(%err, "observability server exited with error");
                    }
                });
                Some(metrics)
            }
            Err(err) => {
                warn!(%err, "metrics initialization failed, continuing without");
                None
            }
        },
        None => None,
    };

    let clock = Arc::new(SystemClock::new());
    let store = Arc::new(MemoryStore::new());
    let rate_store = Arc::new(InMemoryRateStore::new());

    spawn_sweeper(
        rate_store.clone(),
        clock.clone(),
        Duration::from_secs(cfg.rate_limit.sweep_interval_secs),
    );

    let gate = match Gatekeeper::new(&cfg, store, rate_store, clock, metrics.clone()) {
        Ok(gate) => Arc::new(gate),
        Err(err) => {
            error!(%err, "failed to build the admission gate");
            std::process::exit(1);
        }
    };

    if let Err(err) = leadgate_lib::run(Arc::new(cfg), gate, metrics).await {
        error!(%err, "gate exited with error");
        std::process::exit(1);
    }
}
