use crate::metrics::DetectMetrics;
use inference::Detect;
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detect>,
    pub request_timeout: Duration,
    pub metrics: DetectMetrics,
}

impl AppState {
    pub fn new(detector: Arc<dyn Detect>, request_timeout: Duration) -> Self {
        Self {
            detector,
            request_timeout,
            metrics: DetectMetrics::default(),
        }
    }
}
