use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "pension_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "pension_http_request_duration_seconds";

/// Counter: failed logins and rejected bearer tokens.
pub const AUTH_FAILURES_TOTAL: &str = "pension_auth_failures_total";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_CREATED_TOTAL: &str = "pension_bookings_created_total";

/// Counter: booking attempts refused because the stay was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "pension_booking_conflicts_total";

/// Counter: bookings moved to cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "pension_bookings_cancelled_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "pension_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "pension_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "pension_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Collapse an HTTP status to its class for low-cardinality labels.
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
