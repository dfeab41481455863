//! Source platform abstraction
//!
//! The relay core consumes [`SourcePost`](crate::types::SourcePost) values and
//! needs exactly one operation from the source platform: downloading an
//! attached media file. Connecting, authenticating and receiving updates are
//! handled by the concrete adapter ([`telegram`]).

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::MediaRef;

pub mod telegram;

// Mock source is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Media download from the source platform
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Download `media` into the file at `dest`, creating or truncating it
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Download` if the platform refuses or the transfer
    /// fails, `MediaError::Io` if the file cannot be written.
    async fn download_media(&self, media: &MediaRef, dest: &Path) -> Result<()>;
}
