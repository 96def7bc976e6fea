//! Still-frame extraction.

use std::path::Path;

use mvid_models::encoding::{LAST_FRAME_SEEK_FROM_END, SEED_FRAME_JPEG_QUALITY};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// A decoded still image, kept as its encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
}

impl FrameImage {
    /// Validate encoded image bytes and read their dimensions.
    pub fn from_bytes(bytes: Vec<u8>) -> MediaResult<Self> {
        if bytes.is_empty() {
            return Err(MediaError::invalid_image("empty frame"));
        }

        let format = image::guess_format(&bytes)
            .map_err(|e| MediaError::invalid_image(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| MediaError::invalid_image(e.to_string()))?;

        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(MediaError::invalid_image("zero-sized frame"));
        }

        let mime_type = match format {
            image::ImageFormat::Png => "image/png",
            image::ImageFormat::WebP => "image/webp",
            _ => "image/jpeg",
        };

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            bytes,
            mime_type,
        })
    }
}

/// Command grabbing the final frame of a clip (path or URL) as a JPEG.
pub fn last_frame_command(input: impl AsRef<Path>, output: impl AsRef<Path>) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .seek_from_end(LAST_FRAME_SEEK_FROM_END)
        .single_frame()
        .update_single_image()
        .image_quality(SEED_FRAME_JPEG_QUALITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([40u8, 90, 160]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageOutputFormat::Jpeg(90))
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decodes_jpeg_frame() {
        let frame = FrameImage::from_bytes(jpeg(64, 36)).unwrap();
        assert_eq!((frame.width, frame.height), (64, 36));
        assert_eq!(frame.mime_type, "image/jpeg");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(FrameImage::from_bytes(Vec::new()).is_err());
        assert!(FrameImage::from_bytes(b"not an image".to_vec()).is_err());
    }

    #[test]
    fn test_last_frame_args() {
        let args = last_frame_command("in.mp4", "out.jpg").build_args();
        assert!(args.contains(&"-sseof".to_string()));
        assert!(args.contains(&"-q:v".to_string()));
        assert!(args.contains(&"2".to_string()));
    }
}
