//! HTTP clients for the services the pipeline depends on.
//!
//! - [`ClipGeneratorClient`]: hosted text/image-to-video generation
//! - [`ContentServiceClient`]: mechanism summary and segment prompts
//! - [`MergeJobClient`]: server-side merge jobs
//! - [`SegmentDownloader`]: fetching hosted clips

pub mod content;
pub mod download;
pub mod error;
pub mod generator;
mod http;
pub mod merge_job;
pub mod types;

pub use content::{ContentServiceClient, ContentServiceConfig};
pub use download::SegmentDownloader;
pub use error::{ClientError, ClientResult};
pub use generator::{ClipGeneratorClient, ClipGeneratorConfig};
pub use merge_job::{MergeBackendConfig, MergeJobClient};
pub use types::{JobProgress, JobResult, JobState, JobStatus};
