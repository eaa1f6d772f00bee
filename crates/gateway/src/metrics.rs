use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

/// Request-level instruments for `/detect`. Without an installed meter
/// provider these are no-ops.
#[derive(Clone)]
pub struct DetectMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
    results: Counter<u64>,
}

impl DetectMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.5, 5.0, 10.0,
        ];

        Self {
            requests: meter
                .u64_counter("detect_requests_total")
                .with_description("Detection requests by outcome")
                .build(),
            duration: meter
                .f64_histogram("detect_duration_seconds")
                .with_description("Time spent decoding, inferring and filtering one upload")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            results: meter
                .u64_counter("detect_results_total")
                .with_description("Allowlisted detections returned")
                .build(),
        }
    }

    pub fn record_success(&self, elapsed: Duration, results: usize) {
        self.requests.add(1, &[KeyValue::new("outcome", "ok")]);
        self.duration.record(elapsed.as_secs_f64(), &[]);
        self.results.add(results as u64, &[]);
    }

    pub fn record_empty(&self) {
        self.requests.add(1, &[KeyValue::new("outcome", "no_file")]);
    }

    pub fn record_failure(&self, outcome: &'static str, elapsed: Duration) {
        self.requests.add(1, &[KeyValue::new("outcome", outcome)]);
        self.duration.record(elapsed.as_secs_f64(), &[]);
    }
}

impl Default for DetectMetrics {
    fn default() -> Self {
        Self::new("gateway")
    }
}
