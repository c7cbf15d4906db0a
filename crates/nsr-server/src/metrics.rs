//! Metrics collection and export for nsr.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use nsr_core::{handler, middleware, Handler, HandlerResult, Middleware, Response};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Metric names.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "nsr_requests_total";
    pub const REQUEST_LATENCY_SECONDS: &str = "nsr_request_latency_seconds";
    pub const ERRORS_TOTAL: &str = "nsr_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of requests dispatched, by outcome"
    );
    metrics::describe_histogram!(
        names::REQUEST_LATENCY_SECONDS,
        "Handler chain latency in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of error replies, by type");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// How a request ended.
pub fn outcome(result: &HandlerResult, response: &Response) -> &'static str {
    match (result, response.error()) {
        (Err(_), _) => "handler_error",
        (Ok(()), Some(_)) => "explicit_error",
        (Ok(()), None) => "success",
    }
}

/// Record a finished request.
pub fn record_request(outcome: &'static str, seconds: f64) {
    counter!(names::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::REQUEST_LATENCY_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Middleware recording request counts, latency and error codes.
#[must_use]
pub fn metrics_middleware() -> Middleware {
    middleware(|next: Handler| -> Handler {
        handler(move |response, request| {
            let start = Instant::now();
            let result = next(response, request);

            let outcome = outcome(&result, response);
            record_request(outcome, start.elapsed().as_secs_f64());
            match (&result, response.error()) {
                (Err(_), _) => record_error(nsr_core::HANDLER_ERROR_CODE),
                (Ok(()), Some(explicit)) => record_error(&explicit.code),
                (Ok(()), None) => {}
            }

            result
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsr_core::{compose, BoxError, Request};

    #[test]
    fn test_outcome() {
        let mut response = Response::new();
        assert_eq!(outcome(&Ok(()), &response), "success");

        response.write_error("BadRequest", "");
        assert_eq!(outcome(&Ok(()), &response), "explicit_error");

        let failed: HandlerResult = Err::<(), BoxError>("boom".into());
        assert_eq!(outcome(&failed, &response), "handler_error");
    }

    #[test]
    fn test_middleware_passes_result_through() {
        let failing = handler(|_, _| Err::<(), BoxError>("boom".into()));
        let composed = compose(&[metrics_middleware()], failing);

        // No recorder is installed, so recording is a no-op.
        let result = composed(&mut Response::new(), &Request::new("a", Vec::new()));
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
