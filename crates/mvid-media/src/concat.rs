//! Clip concatenation via the ffconcat demuxer.

use std::path::{Path, PathBuf};

use mvid_models::EncodingConfig;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Manifest file name inside a work directory.
pub const MANIFEST_NAME: &str = "inputs.txt";

/// Render an ffconcat manifest listing `inputs` in order.
pub fn manifest(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| {
            // Single quotes are closed, escaped, and reopened
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Write the manifest into `dir` and return its path.
pub async fn write_manifest(dir: &Path, inputs: &[PathBuf]) -> MediaResult<PathBuf> {
    if inputs.is_empty() {
        return Err(MediaError::NoInputs);
    }
    let path = dir.join(MANIFEST_NAME);
    tokio::fs::write(&path, manifest(inputs)).await?;
    Ok(path)
}

/// Command concatenating every manifest entry with a full re-encode.
pub fn concat_command(
    manifest_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(manifest_path, output)
        .concat_demuxer()
        .encoding(encoding.to_ffmpeg_args())
}

/// Command re-encoding one clip into another container/quality.
pub fn transcode_command(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(input, output).encoding(encoding.to_ffmpeg_args())
}
