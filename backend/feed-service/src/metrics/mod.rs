//! Prometheus metrics for feed-service

use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder,
};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "feed_service_http_requests_total",
            "Total HTTP requests handled by feed-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create feed_service_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register feed_service_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "feed_service_http_request_duration_seconds",
            "HTTP request latency for feed-service",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "path", "status"],
    )
    .expect("failed to create feed_service_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register feed_service_http_request_duration_seconds");
    histogram
});

static FEED_COMPOSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "feed_compositions_total",
            "Feed compositions by feed kind and outcome",
        ),
        &["kind", "outcome"],
    )
    .expect("failed to create feed_compositions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register feed_compositions_total");
    counter
});

/// Size of the ordered pool before pagination
static FEED_POOL_SIZE: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "feed_candidate_pool_size",
            "Candidates left after diversity rules, before pagination",
        )
        .buckets(vec![0.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]),
        &["kind"],
    )
    .expect("failed to create feed_candidate_pool_size");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register feed_candidate_pool_size");
    histogram
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn record_feed_composition(kind: &str, pool_size: usize) {
    FEED_COMPOSITIONS_TOTAL
        .with_label_values(&[kind, "success"])
        .inc();
    FEED_POOL_SIZE
        .with_label_values(&[kind])
        .observe(pool_size as f64);
}

pub fn record_feed_failure(kind: &str) {
    FEED_COMPOSITIONS_TOTAL
        .with_label_values(&[kind, "error"])
        .inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
