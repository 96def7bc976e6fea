//! Server-side merge job tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use validator::Validate;

use mvid_clip_client::{ClientError, JobState};
use mvid_models::{MergeRequest, MergeTier};

use super::{MergeJob, MergeOutput, MergeStrategy};
use crate::cancel::ensure_active;
use crate::collaborators::MergeJobApi;
use crate::error::{PipelineError, PipelineResult};

/// Submits the clip URLs to the merge backend and polls until done.
pub struct BackendMerge {
    api: Arc<dyn MergeJobApi>,
    poll_interval: Duration,
    timeout: Duration,
}

impl BackendMerge {
    pub fn new(api: Arc<dyn MergeJobApi>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            api,
            poll_interval,
            timeout,
        }
    }
}

#[async_trait]
impl MergeStrategy for BackendMerge {
    fn tier(&self) -> MergeTier {
        MergeTier::Backend
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    async fn merge(&self, job: &MergeJob<'_>) -> PipelineResult<MergeOutput> {
        let request = MergeRequest::from_segments(
            job.segments,
            job.settings.format,
            job.settings.quality,
            job.subject_name.map(str::to_string),
        );
        request
            .validate()
            .map_err(|e| PipelineError::merge_failed(format!("request not accepted by backend: {}", e)))?;

        let job_id = self.api.submit(&request).await?;
        let cleanup = JobCleanup::new(Arc::clone(&self.api), job_id.clone());
        info!(job_id = %job_id, segments = request.segments.len(), "Merge job submitted");
        job.scope.report(5, "Merge job submitted");

        let status = loop {
            ensure_active(job.cancel)?;
            let status = self.api.status(&job_id).await?;
            match status.status {
                JobState::Completed => break status,
                JobState::Failed => {
                    return Err(ClientError::JobFailed {
                        job_id,
                        message: status.error.unwrap_or_else(|| "unknown error".to_string()),
                    }
                    .into());
                }
                JobState::Pending | JobState::Processing => {
                    if let Some(progress) = &status.progress {
                        debug!(job_id = %job_id, stage = %progress.stage, progress = progress.progress, "Merge job progress");
                        job.scope.report(
                            progress.progress.clamp(0.0, 100.0) as u8,
                            progress.message.clone(),
                        );
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        let bytes = self.api.fetch(&job_id).await?;
        // Job deletion happens outside the tier timeout
        drop(cleanup);

        let duration_seconds = status
            .result
            .map(|r| r.duration)
            .filter(|d| *d > 0.0)
            .unwrap_or_else(|| job.playable_duration());

        Ok(MergeOutput {
            bytes,
            duration_seconds,
            format: job.settings.format,
        })
    }
}

/// Deletes a submitted job in the background once the attempt ends,
/// whether it finished, failed, timed out or was cancelled.
struct JobCleanup {
    api: Arc<dyn MergeJobApi>,
    job_id: Option<String>,
}

impl JobCleanup {
    fn new(api: Arc<dyn MergeJobApi>, job_id: String) -> Self {
        Self {
            api,
            job_id: Some(job_id),
        }
    }
}

impl Drop for JobCleanup {
    fn drop(&mut self) {
        let Some(job_id) = self.job_id.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let api = Arc::clone(&self.api);
            handle.spawn(async move {
                api.delete(&job_id).await;
            });
        }
    }
}
