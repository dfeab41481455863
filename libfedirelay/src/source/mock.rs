//! Mock media source for testing

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{MediaError, Result};
use crate::source::MediaSource;
use crate::types::MediaRef;

/// In-memory media source that writes fixed bytes or fails
#[derive(Debug, Clone, Default)]
pub struct MockMediaSource {
    /// Bytes written on success
    pub content: Vec<u8>,

    /// Error returned instead of downloading
    pub error: Option<String>,

    /// Write part of the content before failing
    pub write_partial_on_error: bool,

    /// File ids that have been requested
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockMediaSource {
    /// Create a source that always succeeds with `content`
    pub fn success(content: &[u8]) -> Self {
        Self {
            content: content.to_vec(),
            ..Default::default()
        }
    }

    /// Create a source whose downloads fail after writing a partial file
    pub fn failure(error: &str) -> Self {
        Self {
            content: b"partial".to_vec(),
            error: Some(error.to_string()),
            write_partial_on_error: true,
            ..Default::default()
        }
    }

    /// Number of download requests received
    pub fn download_count(&self) -> usize {
        self.requested.lock().map(|ids| ids.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MediaSource for MockMediaSource {
    async fn download_media(&self, media: &MediaRef, dest: &Path) -> Result<()> {
        if let Ok(mut ids) = self.requested.lock() {
            ids.push(media.file_id.clone());
        }

        if let Some(error) = &self.error {
            if self.write_partial_on_error {
                tokio::fs::write(dest, &self.content)
                    .await
                    .map_err(MediaError::Io)?;
            }
            return Err(MediaError::Download(error.clone()).into());
        }

        tokio::fs::write(dest, &self.content)
            .await
            .map_err(MediaError::Io)?;
        Ok(())
    }
}
