//! Pipeline metrics.
//!
//! Counters and histograms for segment generation, frame chaining,
//! merge tiers and whole runs.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    pub const SEGMENTS_TOTAL: &str = "mvid_segments_total";
    pub const SEGMENT_DURATION_SECONDS: &str = "mvid_segment_generation_seconds";
    pub const FRAME_EXTRACTIONS_TOTAL: &str = "mvid_frame_extractions_total";
    pub const MERGE_ATTEMPTS_TOTAL: &str = "mvid_merge_attempts_total";
    pub const MERGE_DURATION_SECONDS: &str = "mvid_merge_duration_seconds";
    pub const UPLOADS_TOTAL: &str = "mvid_uploads_total";
    pub const RUNS_TOTAL: &str = "mvid_runs_total";
    pub const RUN_DURATION_SECONDS: &str = "mvid_run_duration_seconds";
}

/// Install the Prometheus recorder with a scrape endpoint on `port`.
///
/// Must be called from within a tokio runtime.
pub fn init_exporter(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record one clip generation call.
pub fn record_segment(strategy: &str, seeded: bool, success: bool, duration_secs: f64) {
    counter!(
        names::SEGMENTS_TOTAL,
        "strategy" => strategy.to_string(),
        "mode" => if seeded { "image_to_video" } else { "text_to_video" },
        "outcome" => outcome(success)
    )
    .increment(1);

    histogram!(
        names::SEGMENT_DURATION_SECONDS,
        "strategy" => strategy.to_string()
    )
    .record(duration_secs);
}

pub fn record_frame_extraction(success: bool) {
    counter!(names::FRAME_EXTRACTIONS_TOTAL, "outcome" => outcome(success)).increment(1);
}

/// Record one merge tier attempt.
pub fn record_merge_attempt(tier: &str, success: bool, duration_secs: f64) {
    counter!(
        names::MERGE_ATTEMPTS_TOTAL,
        "tier" => tier.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);

    histogram!(names::MERGE_DURATION_SECONDS, "tier" => tier.to_string()).record(duration_secs);
}

pub fn record_upload(success: bool) {
    counter!(names::UPLOADS_TOTAL, "outcome" => outcome(success)).increment(1);
}

pub fn record_run(success: bool, duration_secs: f64) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome(success)).increment(1);
    histogram!(names::RUN_DURATION_SECONDS).record(duration_secs);
}
