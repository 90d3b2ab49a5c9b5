//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for composition jobs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use scenecraft_models::{JobId, JobState};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    ///
    /// # Arguments
    /// * `job_id` - The unique identifier for the job
    /// * `operation` - The type of operation (e.g., "compose", "scene_clips")
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a lifecycle transition.
    pub fn log_state(&self, state: JobState) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            state = %state,
            "Job state changed"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    /// Log the terminal state of a job that produced output.
    pub fn log_completion(&self, state: JobState, elapsed_secs: f64, dropped: usize) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            state = %state,
            elapsed_secs = elapsed_secs,
            dropped_scenes = dropped,
            "Job finished"
        );
    }

    /// Log a scene that was excluded from the output.
    pub fn log_scene_dropped(&self, scene_number: u32, reason: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            scene_number = scene_number,
            reason = %reason,
            "Scene dropped"
        );
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }

    /// Create a tracing span for one scene task of this job.
    pub fn scene_span(&self, scene_number: u32) -> Span {
        tracing::info_span!(
            "scene",
            job_id = %self.job_id,
            scene_number = scene_number
        )
    }
}
