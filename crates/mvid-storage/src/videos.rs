//! Merged video storage.

use mvid_models::{slugify, OutputFormat, UploadMetadata, UploadedAsset};
use tracing::{info, warn};

use crate::client::R2Client;
use crate::error::StorageResult;

/// Object key of a run's merged video: `videos/{run_id}/{file_name}`.
///
/// Falls back to `{slug}.{ext}` when the metadata carries no file name.
pub fn video_key(metadata: &UploadMetadata, format: OutputFormat) -> String {
    let file_name = metadata.file_name.trim();
    if file_name.is_empty() {
        format!(
            "videos/{}/{}.{}",
            metadata.run_id,
            slugify(&metadata.subject_name),
            format.extension()
        )
    } else {
        format!("videos/{}/{}", metadata.run_id, file_name)
    }
}

impl R2Client {
    /// Store a merged video and describe where it lives.
    ///
    /// A failed presign still yields the permanent URL.
    pub async fn store_video(
        &self,
        bytes: Vec<u8>,
        metadata: &UploadMetadata,
        format: OutputFormat,
    ) -> StorageResult<UploadedAsset> {
        let key = video_key(metadata, format);
        let size = bytes.len();

        self.upload_bytes(bytes, &key, &metadata.content_type).await?;

        let expiring_url = match self.presign_get(&key, self.presign_expiry()).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(key = %key, "Presign failed: {}", e);
                None
            }
        };

        info!(
            run_id = %metadata.run_id,
            key = %key,
            size_bytes = size,
            "Stored merged video"
        );

        Ok(UploadedAsset {
            url: self.object_url(&key),
            key,
            expiring_url,
        })
    }
}
