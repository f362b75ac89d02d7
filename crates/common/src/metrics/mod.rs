//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions for the
//! review workflow and the HTTP gateway.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all EBMS metrics
pub const METRICS_PREFIX: &str = "ebms";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Buckets for queue commits, which touch one pair after another
pub const COMMIT_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // State machine metrics
    describe_counter!(
        format!("{}_state_appends_total", METRICS_PREFIX),
        Unit::Count,
        "State rows appended, by state value"
    );

    describe_counter!(
        format!("{}_decisions_total", METRICS_PREFIX),
        Unit::Count,
        "Queue decisions applied, by queue and outcome"
    );

    // Queue metrics
    describe_histogram!(
        format!("{}_queue_commit_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Queue commit latency in seconds"
    );

    describe_counter!(
        format!("{}_queue_commit_pairs_total", METRICS_PREFIX),
        Unit::Count,
        "Article-topic pairs processed by queue commits, by outcome"
    );

    // Packet metrics
    describe_counter!(
        format!("{}_packets_created_total", METRICS_PREFIX),
        Unit::Count,
        "Reviewer packets created"
    );

    describe_counter!(
        format!("{}_reviews_posted_total", METRICS_PREFIX),
        Unit::Count,
        "Reviewer responses posted"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one appended state row
pub fn record_state_append(state: &str) {
    counter!(
        format!("{}_state_appends_total", METRICS_PREFIX),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Record one decision outcome (`applied`, or an error code)
pub fn record_decision(queue: &str, outcome: &str) {
    counter!(
        format!("{}_decisions_total", METRICS_PREFIX),
        "queue" => queue.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a finished queue commit
pub fn record_commit(duration_secs: f64, queue: &str, succeeded: usize, failed: usize) {
    histogram!(
        format!("{}_queue_commit_duration_seconds", METRICS_PREFIX),
        "queue" => queue.to_string()
    )
    .record(duration_secs);

    counter!(
        format!("{}_queue_commit_pairs_total", METRICS_PREFIX),
        "queue" => queue.to_string(),
        "outcome" => "succeeded"
    )
    .increment(succeeded as u64);

    counter!(
        format!("{}_queue_commit_pairs_total", METRICS_PREFIX),
        "queue" => queue.to_string(),
        "outcome" => "failed"
    )
    .increment(failed as u64);
}

pub fn record_packet_created(articles: usize) {
    counter!(format!("{}_packets_created_total", METRICS_PREFIX)).increment(1);
    tracing::trace!(articles, "Packet metric recorded");
}

pub fn record_review_posted(quick_reject: bool) {
    counter!(
        format!("{}_reviews_posted_total", METRICS_PREFIX),
        "kind" => if quick_reject { "quick_reject" } else { "full" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_are_sorted() {
        for buckets in [LATENCY_BUCKETS, COMMIT_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_run_without_exporter() {
        let metrics = RequestMetrics::start("POST", "/v1/queues/{id}/commit");
        metrics.finish(200);
        record_state_append("passed_full_review");
        record_decision("Full Text Review", "applied");
        record_commit(0.02, "Full Text Review", 3, 1);
        record_packet_created(4);
        record_review_posted(true);
    }
}
