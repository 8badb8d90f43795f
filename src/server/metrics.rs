use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all service metrics
const PREFIX: &str = "pdf2jpg";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Conversion Metrics
    pub static ref CONVERSIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_conversions_total"), "Conversions by input source and outcome"),
        &["source", "outcome"]
    ).expect("Failed to create conversions_total metric");

    pub static ref CONVERSION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_conversion_duration_seconds"),
            "Time from request to finished ZIP in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["source"]
    ).expect("Failed to create conversion_duration_seconds metric");

    pub static ref PAGES_RENDERED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_pages_rendered_total"),
        "Total number of pages rendered to JPEG"
    ).expect("Failed to create pages_rendered_total metric");

    pub static ref DOWNLOADED_BYTES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_downloaded_bytes_total"),
        "Total bytes fetched for pdf_url conversions"
    ).expect("Failed to create downloaded_bytes_total metric");

    // Temp Sweep Metrics
    pub static ref TEMP_SWEEP_DELETED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_temp_sweep_deleted_total"),
        "Orphaned temp entries removed by the sweeper"
    ).expect("Failed to create temp_sweep_deleted_total metric");

    pub static ref TEMP_SWEEP_ERRORS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_temp_sweep_errors_total"),
        "Errors encountered by the temp sweeper"
    ).expect("Failed to create temp_sweep_errors_total metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Total errors by type and endpoint"),
        &["error_type", "endpoint"]
    ).expect("Failed to create errors_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CONVERSIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CONVERSION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PAGES_RENDERED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DOWNLOADED_BYTES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TEMP_SWEEP_DELETED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TEMP_SWEEP_ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Collapse request paths into a small, fixed label set.
pub fn categorize_endpoint(path: &str) -> &'static str {
    match path.trim_end_matches('/') {
        "" => "root",
        "/health" => "health",
        "/convert" => "convert",
        _ => "other",
    }
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let endpoint = categorize_endpoint(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

/// Record a finished conversion attempt
pub fn record_conversion(source: &str, outcome: &str, duration: Duration) {
    CONVERSIONS_TOTAL
        .with_label_values(&[source, outcome])
        .inc();

    CONVERSION_DURATION_SECONDS
        .with_label_values(&[source])
        .observe(duration.as_secs_f64());
}

pub fn record_pages_rendered(pages: usize) {
    PAGES_RENDERED_TOTAL.inc_by(pages as f64);
}

pub fn record_downloaded_bytes(bytes: u64) {
    DOWNLOADED_BYTES_TOTAL.inc_by(bytes as f64);
}

pub fn record_sweep(deleted: usize, errors: usize) {
    TEMP_SWEEP_DELETED_TOTAL.inc_by(deleted as f64);
    TEMP_SWEEP_ERRORS_TOTAL.inc_by(errors as f64);
}

/// Record an error
pub fn record_error(error_type: &str, endpoint: &str) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, endpoint])
        .inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find_map(|line| line.strip_prefix("VmRSS:"))
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|kb| kb.parse::<f64>().ok());
            if let Some(kb) = rss_kb {
                PROCESS_MEMORY_BYTES.set(kb * 1024.0);
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
