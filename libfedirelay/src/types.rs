//! Core types for fedirelay

use serde::{Deserialize, Serialize};

/// A post received from a source channel
///
/// Built by the source adapter from one inbound update and never mutated
/// afterwards. `text` uses the markdown dialect understood by
/// [`normalize`](crate::normalize): `**bold**`, `__italic__`, `~~strike~~`,
/// `` `code` `` and `[label](url)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePost {
    /// Public handle of the channel (without `@`), if it has one
    pub channel_handle: Option<String>,
    pub message_id: i32,
    /// Whether the update is a channel post (as opposed to a chat message)
    pub is_post: bool,
    /// Whether the authoring chat is a broadcast channel
    pub is_broadcast_channel: bool,
    pub text: Option<String>,
    /// Album identifier, set for every member of a grouped submission
    pub grouped_id: Option<String>,
    pub forward_origin: Option<ForwardOrigin>,
    /// Attached photo, video or animation
    pub media: Option<MediaRef>,
    /// Name of an attached non-media file
    pub file_name: Option<String>,
}

impl SourcePost {
    /// Create a plain-text broadcast channel post
    pub fn channel_post(channel_handle: &str, message_id: i32, text: &str) -> Self {
        Self {
            channel_handle: Some(channel_handle.to_string()),
            message_id,
            is_post: true,
            is_broadcast_channel: true,
            text: Some(text.to_string()),
            ..Default::default()
        }
    }
}

/// Where a forwarded post originally came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOrigin {
    pub title: String,
    pub handle: Option<String>,
}

/// Kinds of attachments that get re-uploaded to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
}

impl MediaKind {
    /// File extension used when the source declares no usable MIME type
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video | MediaKind::Animation => "mp4",
        }
    }

    /// Derive the staging file extension from a declared MIME type
    pub fn extension_for(&self, mime_type: Option<&str>) -> String {
        let from_mime = mime_type.and_then(|mime| match mime.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/png" => Some("png"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            "video/mp4" => Some("mp4"),
            "video/webm" => Some("webm"),
            "video/quicktime" => Some("mov"),
            _ => None,
        });

        from_mime.unwrap_or_else(|| self.default_extension()).to_string()
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Animation => write!(f, "animation"),
        }
    }
}

/// Reference to a downloadable attachment on the source platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Source-platform file identifier
    pub file_id: String,
    /// Extension (without dot) for the staged copy
    pub extension: String,
}

/// Post visibility on the destination platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Unlisted => write!(f, "unlisted"),
            Visibility::Private => write!(f, "private"),
            Visibility::Direct => write!(f, "direct"),
        }
    }
}

/// Ordered ids of the posts created for one source post on one account
///
/// Every id after the first replies to the one before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChain {
    ids: Vec<String>,
}

impl PostChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: String) {
        self.ids.push(id);
    }

    /// Id of the root post
    pub fn root(&self) -> Option<&str> {
        self.ids.first().map(String::as_str)
    }

    /// Id of the most recent post, i.e. the parent of the next reply
    pub fn last(&self) -> Option<&str> {
        self.ids.last().map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
