//! Destination platform abstraction and implementations
//!
//! A [`Destination`] is one account on a Mastodon-API compatible server. The
//! relay needs three operations from it: uploading media, creating a root
//! post, and replying to a previous post.
//!
//! # Examples
//!
//! ```no_run
//! use libfedirelay::platforms::{Destination, mastodon::MastodonClient};
//! use libfedirelay::types::Visibility;
//!
//! # async fn example() -> libfedirelay::error::Result<()> {
//! let client = MastodonClient::new(
//!     "main",
//!     "https://mastodon.social".to_string(),
//!     "your-access-token".to_string(),
//! )?;
//!
//! client.authenticate().await?;
//!
//! let root = client.create_post("First part…", None, Some(Visibility::Unlisted)).await?;
//! client.create_reply("…second part", &root, Some(Visibility::Unlisted)).await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Visibility;

pub mod mastodon;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Client for one destination account
///
/// Implementations are shared between concurrent relays and must not hold
/// per-relay state.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Account name as used in the mapping configuration
    fn name(&self) -> &str;

    /// Verify the account credentials
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the credentials are rejected.
    async fn authenticate(&self) -> Result<()>;

    /// Upload a media file and return its media id
    ///
    /// Media ids belong to the uploading account and cannot be reused by
    /// another destination.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Media` if the upload fails.
    async fn upload_media(&self, path: &Path) -> Result<String>;

    /// Create a top-level post and return its id
    async fn create_post(
        &self,
        text: &str,
        media_id: Option<&str>,
        visibility: Option<Visibility>,
    ) -> Result<String>;

    /// Create a reply to `in_reply_to` and return its id
    async fn create_reply(
        &self,
        text: &str,
        in_reply_to: &str,
        visibility: Option<Visibility>,
    ) -> Result<String>;
}
