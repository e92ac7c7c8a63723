//! Pipeline and live-feed metrics recorded through the `metrics` facade.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_SUBMITTED_TOTAL: &str = "vguard_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vguard_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vguard_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vguard_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "vguard_stage_duration_seconds";

    // Live feed metrics
    pub const LIVE_FRAMES_TOTAL: &str = "vguard_live_frames_total";
    pub const LIVE_FRAMES_DROPPED_TOTAL: &str = "vguard_live_frames_dropped_total";
    pub const LIVE_FEEDS_ACTIVE: &str = "vguard_live_feeds_active";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record a job reaching a terminal state.
pub fn record_job_finished(succeeded: bool, duration_secs: f64) {
    let status = if succeeded { "completed" } else { "failed" };
    if succeeded {
        counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    } else {
        counter!(names::JOBS_FAILED_TOTAL).increment(1);
    }
    histogram!(names::JOB_DURATION_SECONDS, "status" => status).record(duration_secs);
}

pub fn record_stage(stage: &'static str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(duration_secs);
}

/// Record one analyzed live frame.
pub fn record_live_frame(camera_id: &str) {
    counter!(names::LIVE_FRAMES_TOTAL, "camera_id" => camera_id.to_string()).increment(1);
}

pub fn record_live_frame_dropped(camera_id: &str) {
    counter!(names::LIVE_FRAMES_DROPPED_TOTAL, "camera_id" => camera_id.to_string()).increment(1);
}

pub fn set_live_feeds_active(count: usize) {
    gauge!(names::LIVE_FEEDS_ACTIVE).set(count as f64);
}
