use actix_web::{HttpResponse, Responder};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Authentication metrics
    pub static ref AUTH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_events_total", "Registration, login and logout outcomes"),
        &["event", "outcome"]
    ).unwrap();

    // Store metrics
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("store_errors_total", "Failed data-store or session-store operations"),
        &["operation"]
    ).unwrap();
}

/// Register the service counters with [`REGISTRY`]. Call once at startup.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(AUTH_EVENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn record_auth(event: &str, outcome: &str) {
    AUTH_EVENTS_TOTAL.with_label_values(&[event, outcome]).inc();
}

pub fn record_store_error(operation: &str) {
    STORE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

/// Prometheus metrics endpoint handler
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("Failed to encode metrics: {}", e));
    }

    match String::from_utf8(buffer) {
        Ok(metrics) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(metrics),
        Err(e) => HttpResponse::InternalServerError().body(format!("Failed to convert metrics: {}", e)),
    }
}
