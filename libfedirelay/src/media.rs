//! Temporary local copies of source media
//!
//! A [`StagedMedia`] owns one downloaded file for the duration of a single
//! relay. The owner calls [`StagedMedia::release`] when done; if the value is
//! dropped without being released (early return, panic), the file is removed
//! synchronously instead.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{MediaError, Result};
use crate::source::MediaSource;
use crate::types::MediaRef;

/// Downloads attachments into a staging directory
#[derive(Debug, Clone)]
pub struct MediaStager {
    dir: PathBuf,
}

impl MediaStager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh, unique path for an attachment with the given extension
    pub fn unique_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", Uuid::new_v4(), extension))
    }

    /// Download `media` from `source` into a new staging file
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Io` if the staging directory cannot be created and
    /// `MediaError::Download` if the source fails. No file is left behind on
    /// failure.
    pub async fn stage(&self, source: &dyn MediaSource, media: &MediaRef) -> Result<StagedMedia> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(MediaError::Io)?;

        // Guard first, so a failed or partial download is cleaned up as well.
        let staged = StagedMedia::new(self.unique_path(&media.extension));
        debug!("Downloading {} to {}", media.kind, staged.path().display());

        source.download_media(media, staged.path()).await?;

        Ok(staged)
    }
}

/// A downloaded attachment on local disk
#[derive(Debug)]
pub struct StagedMedia {
    path: PathBuf,
    released: bool,
}

impl StagedMedia {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged file
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed staged media {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged media {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for StagedMedia {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staged media {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Release staged media if there is any
pub async fn release(staged: Option<StagedMedia>) {
    if let Some(staged) = staged {
        staged.release().await;
    }
}
