//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for generation runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use mvid_models::RunId;

/// Run logger for structured logging with consistent formatting.
///
/// Every line carries the run ID and subject so interleaved runs stay
/// readable.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    subject: String,
}

impl RunLogger {
    pub fn new(run_id: &RunId, subject: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            subject: subject.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            subject = %self.subject,
            "Run started: {}", message
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            run_id = %self.run_id,
            subject = %self.subject,
            stage,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            subject = %self.subject,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            subject = %self.subject,
            "Run failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            subject = %self.subject,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Span covering the whole run; child log lines inherit its fields.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            subject = %self.subject
        )
    }
}
