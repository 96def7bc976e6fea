//! Cloudflare R2 storage client.
//!
//! This crate provides:
//! - Byte uploads to R2
//! - Presigned URL generation
//! - Merged video storage under per-run keys

pub mod client;
pub mod error;
pub mod videos;

pub use client::{R2Client, R2Config, DEFAULT_PRESIGN_EXPIRY};
pub use error::{StorageError, StorageResult};
pub use videos::video_key;
