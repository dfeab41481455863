//! fedirelay - relay public Telegram channel posts to Mastodon accounts
//!
//! Each inbound channel post is normalized into plain text with a back-link,
//! split into chunks that fit each destination account's post limit, and
//! published as a reply chain. Media attachments are downloaded once per
//! post and uploaded to every mapped account.

pub mod chunker;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod media;
pub mod normalize;
pub mod platforms;
pub mod publisher;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use chunker::split_into_chunks;
pub use config::Config;
pub use dispatcher::{AccountOutcome, Dispatcher, RelayOutcome, RelayReport, SkipReason};
pub use error::{RelayError, Result};
pub use mapping::{AccountSettings, MappingTable};
pub use normalize::Normalizer;
pub use publisher::{publish, PublishFailure};
pub use types::{MediaKind, MediaRef, PostChain, SourcePost, Visibility};
