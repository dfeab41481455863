//! Publishing a chunk sequence to one destination account
//!
//! The first chunk becomes the root post and carries the media attachment;
//! every later chunk replies to the post created immediately before it.

use std::path::Path;

use tracing::debug;

use crate::error::{PlatformError, RelayError};
use crate::platforms::Destination;
use crate::types::{PostChain, Visibility};

/// A chain that stopped part-way
///
/// `chain` holds the posts that were created before the failure. They are
/// left in place on the destination.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error} (after {} post(s))", chain.len())]
pub struct PublishFailure {
    pub error: PlatformError,
    pub chain: PostChain,
}

/// Publish `chunks` as a reply chain on `destination`
///
/// Media, if any, is uploaded once before the root post. Posting stops at the
/// first failure.
pub async fn publish(
    destination: &dyn Destination,
    chunks: &[String],
    media: Option<&Path>,
    visibility: Option<Visibility>,
) -> std::result::Result<PostChain, PublishFailure> {
    let mut chain = PostChain::new();

    let media_id = match media {
        Some(path) => {
            let id = destination
                .upload_media(path)
                .await
                .map_err(|e| fail(e, PlatformError::Media, &chain))?;
            debug!("Uploaded media to {}: {}", destination.name(), id);
            Some(id)
        }
        None => None,
    };

    for chunk in chunks {
        let result = match chain.last() {
            None => {
                destination
                    .create_post(chunk, media_id.as_deref(), visibility)
                    .await
            }
            Some(parent) => destination.create_reply(chunk, parent, visibility).await,
        };

        let id = result.map_err(|e| fail(e, PlatformError::Posting, &chain))?;
        debug!(
            "Created post {} of {} on {}: {}",
            chain.len() + 1,
            chunks.len(),
            destination.name(),
            id
        );
        chain.push(id);
    }

    Ok(chain)
}

fn fail(
    error: RelayError,
    wrap: fn(String) -> PlatformError,
    chain: &PostChain,
) -> PublishFailure {
    let error = match error {
        RelayError::Platform(e) => e,
        other => wrap(other.to_string()),
    };
    PublishFailure {
        error,
        chain: chain.clone(),
    }
}
