use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub struct Metrics {
    registry: Registry,

    // Request metrics
    pub total_requests: IntCounterVec,

    // Store metrics
    pub store_errors: IntCounter,
    pub query_duration: Histogram,

    // Worker metrics
    pub active_workers: IntGauge,
    pub worker_restarts: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let total_requests = IntCounterVec::new(
            Opts::new(
                "plugin_registry_requests_total",
                "Total number of API requests by route",
            ),
            &["route"],
        )
        .expect("metric creation failed");

        let store_errors = IntCounter::new(
            "plugin_registry_store_errors_total",
            "Store queries that failed or timed out",
        )
        .expect("metric creation failed");
        let query_duration = Histogram::with_opts(prometheus::HistogramOpts::new(
            "plugin_registry_query_duration_seconds",
            "Document store query duration in seconds",
        ))
        .expect("metric creation failed");

        let active_workers = IntGauge::new(
            "plugin_registry_active_workers",
            "Number of running HTTP workers",
        )
        .expect("metric creation failed");
        let worker_restarts = IntCounter::new(
            "plugin_registry_worker_restarts_total",
            "Workers replaced after exiting",
        )
        .expect("metric creation failed");

        // Register all metrics
        registry.register(Box::new(total_requests.clone())).unwrap();
        registry.register(Box::new(store_errors.clone())).unwrap();
        registry.register(Box::new(query_duration.clone())).unwrap();
        registry.register(Box::new(active_workers.clone())).unwrap();
        registry.register(Box::new(worker_restarts.clone())).unwrap();

        Self {
            registry,
            total_requests,
            store_errors,
            query_duration,
            active_workers,
            worker_restarts,
        }
    }

    pub fn record_request(&self, route: &str) {
        self.total_requests.with_label_values(&[route]).inc();
    }

    pub fn record_store_error(&self) {
        self.store_errors.inc();
    }

    pub fn gather_metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        if let Err(e) = encoder.encode(&self.gather_metrics(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
