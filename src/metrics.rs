use crate::CaptureError;
use metrics::{register_counter, register_histogram, Counter, Histogram};
use std::time::Duration;

/// Capture counters shared by the workers of a run.
///
/// Handles come from the globally installed recorder; with none installed
/// every operation is a no-op.
#[derive(Clone)]
pub struct ScanMetrics {
    pub captures_total: Counter,
    pub capture_duration: Histogram,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            captures_total: register_counter!("peepshot_captures_total"),
            capture_duration: register_histogram!("peepshot_capture_duration_seconds"),
        }
    }

    /// Count one capture; failures are labelled with their reason.
    pub fn record_capture(&self, duration: Duration, error: Option<&CaptureError>) {
        self.captures_total.increment(1);
        if let Some(error) = error {
            register_counter!("peepshot_captures_failed_total", "reason" => error.kind())
                .increment(1);
        }
        self.capture_duration.record(duration.as_secs_f64());
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
