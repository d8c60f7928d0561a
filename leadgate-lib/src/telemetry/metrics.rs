use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const METHOD: &str = "method";
    pub const STATUS_CODE: &str = "status_code";
    pub const SCOPE: &str = "scope";
    pub const REASON: &str = "reason";
    pub const COLLECTION: &str = "collection";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,

    pub requests_total: Counter<u64>,
    pub requests_duration_seconds: Histogram<f64>,

    // Admission pipeline metrics
    pub rejections_total: Counter<u64>,
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_rejected_total: Counter<u64>,
    pub dedup_hits_total: Counter<u64>,
    pub dedup_check_failures_total: Counter<u64>,

    // Accepted business submissions
    pub submissions_total: Counter<u64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            connections_total: meter
                .u64_counter("leadgate_connections_total")
                .with_description("Total number of connections accepted")
                .build(),
            connections_active: meter
                .i64_up_down_counter("leadgate_connections_active")
                .with_description("Number of active connections")
                .build(),

            requests_total: meter
                .u64_counter("leadgate_requests_total")
                .with_description("Total number of requests settled by the gate")
                .build(),
            requests_duration_seconds: meter
                .f64_histogram("leadgate_requests_duration_seconds")
                .with_description("Request duration in seconds, socket to settled response")
                .build(),

            rejections_total: meter
                .u64_counter("leadgate_rejections_total")
                .with_description("Total number of requests refused by an admission stage")
                .build(),
            rate_limit_allowed_total: meter
                .u64_counter("leadgate_rate_limit_allowed_total")
                .with_description("Total number of requests admitted by the rate limiter")
                .build(),
            rate_limit_rejected_total: meter
                .u64_counter("leadgate_rate_limit_rejected_total")
                .with_description("Total number of requests refused by the rate limiter (429)")
                .build(),
            dedup_hits_total: meter
                .u64_counter("leadgate_dedup_hits_total")
                .with_description("Total number of submissions recognized as duplicates")
                .build(),
            dedup_check_failures_total: meter
                .u64_counter("leadgate_dedup_check_failures_total")
                .with_description("Total number of duplicate checks that failed against the store")
                .build(),

            submissions_total: meter
                .u64_counter("leadgate_submissions_total")
                .with_description("Total number of submissions persisted, by collection")
                .build(),

            build_info: meter
                .u64_gauge("leadgate_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_request(&self, method: &str, status_code: u16, scope: &str) {
        self.requests_total.add(
            1,
            &[
                KeyValue::new(labels::METHOD, method.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::SCOPE, scope.to_string()),
            ],
        );
    }

    pub fn record_request_duration(
        &self,
        duration: f64,
        method: &str,
        status_code: u16,
        scope: &str,
    ) {
        self.requests_duration_seconds.record(
            duration,
            &[
                KeyValue::new(labels::METHOD, method.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::SCOPE, scope.to_string()),
            ],
        );
    }

    pub fn record_rejection(&self, scope: &str, reason: &str) {
        self.rejections_total.add(
            1,
            &[
                KeyValue::new(labels::SCOPE, scope.to_string()),
                KeyValue::new(labels::REASON, reason.to_string()),
            ],
        );
    }

    pub fn record_rate_limit_allowed(&self, scope: &str) {
        self.rate_limit_allowed_total
            .add(1, &[KeyValue::new(labels::SCOPE, scope.to_string())]);
    }

    pub fn record_rate_limit_rejected(&self, scope: &str) {
        self.rate_limit_rejected_total
            .add(1, &[KeyValue::new(labels::SCOPE, scope.to_string())]);
    }

    pub fn record_dedup_hit(&self, scope: &str) {
        self.dedup_hits_total
            .add(1, &[KeyValue::new(labels::SCOPE, scope.to_string())]);
    }

    pub fn record_dedup_failure(&self, scope: &str) {
        self.dedup_check_failures_total
            .add(1, &[KeyValue::new(labels::SCOPE, scope.to_string())]);
    }

    pub fn record_submission(&self, collection: &str) {
        self.submissions_total
            .add(1, &[KeyValue::new(labels::COLLECTION, collection.to_string())]);
    }

    pub fn record_connection_opened(&self) {
        self.connections_total.add(1, &[]);
        self.connections_active.add(1, &[]);
    }

    pub fn record_connection_closed(&self) {
        self.connections_active.add(-1, &[]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("leadgate");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
