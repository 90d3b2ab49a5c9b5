//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these calls are no-ops.

use metrics::{counter, histogram};

use scenecraft_models::JobState;

/// Metric names as constants for consistency.
pub mod names {
    pub const SCENES_RENDERED_TOTAL: &str = "scenecraft_scenes_rendered_total";
    pub const SCENES_FAILED_TOTAL: &str = "scenecraft_scenes_failed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "scenecraft_jobs_completed_total";
    pub const JOBS_PARTIALLY_FAILED_TOTAL: &str = "scenecraft_jobs_partially_failed_total";
    pub const JOBS_FAILED_TOTAL: &str = "scenecraft_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "scenecraft_job_duration_seconds";
}

pub fn record_scene_rendered() {
    counter!(names::SCENES_RENDERED_TOTAL).increment(1);
}

/// Count a dropped scene, labelled by error kind.
pub fn record_scene_failed(kind: &'static str) {
    counter!(names::SCENES_FAILED_TOTAL, "kind" => kind).increment(1);
}

/// Record a finished job by terminal state.
pub fn record_job_finished(state: JobState, elapsed_secs: f64) {
    let name = match state {
        JobState::Completed => names::JOBS_COMPLETED_TOTAL,
        JobState::PartiallyFailed => names::JOBS_PARTIALLY_FAILED_TOTAL,
        _ => names::JOBS_FAILED_TOTAL,
    };
    counter!(name).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(elapsed_secs);
}
